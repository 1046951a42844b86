//! Reading `health.*` calls out of agent response text.
//!
//! The agent answers in the form
//!
//! ```text
//! Thought: ...
//! Action: health.upsert_patient(patient_name="Jane Doe", symptoms=["cough", "fever"], doctor=None)
//! ```
//!
//! Each call becomes an [`Action`] whose `action_type` is the dotted function
//! name and whose `action_inputs` are the keyword arguments. Supported values:
//!
//! - single- or double-quoted strings with `\n`, `\t`, `\r`, `\\`, `\'`, `\"` escapes
//! - lists of values: `[...]`
//! - `None` / `null`, `True` / `False`
//! - any other bare token (numbers, words), kept as a string
//!
//! Quoted strings may span lines.

use crate::dispatch::Action;
use crate::error::{HimsError, HimsResult};
use serde_json::{Map, Value};

const ACTION_MARKER: &str = "Action:";

/// Parses every call that follows an `Action:` marker in `response`.
///
/// Malformed calls are logged and skipped; a response without markers yields
/// no actions.
pub fn parse_actions(response: &str) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut offset = 0;

    while let Some(found) = response[offset..].find(ACTION_MARKER) {
        let start = offset + found + ACTION_MARKER.len();
        let mut parser = CallParser::new(response, start);

        match parser.call() {
            Ok(action) => {
                actions.push(action);
                offset = parser.pos;
            }
            Err(e) => {
                tracing::warn!("skipping malformed action call: {}", e);
                offset = start;
            }
        }
    }

    actions
}

/// Reads an action batch that is either a JSON array or agent response text.
///
/// Input whose first non-whitespace character is `[` is decoded as JSON;
/// anything else goes through [`parse_actions`].
///
/// # Errors
///
/// Returns [`HimsError::ActionDecode`] for a malformed JSON array.
pub fn read_action_batch(input: &str) -> HimsResult<Vec<Action>> {
    if input.trim_start().starts_with('[') {
        Action::decode_batch(input)
    } else {
        Ok(parse_actions(input))
    }
}

/// Parses a single call such as `health.ensure_hims()`.
///
/// # Errors
///
/// Returns [`HimsError::ActionParse`] if the text is not exactly one
/// well-formed call (surrounding whitespace is allowed).
pub fn parse_action_call(input: &str) -> HimsResult<Action> {
    let mut parser = CallParser::new(input, 0);
    let action = parser.call()?;

    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(parser.error("unexpected text after call"));
    }
    Ok(action)
}

struct CallParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> CallParser<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn call(&mut self) -> HimsResult<Action> {
        self.skip_ws();
        let name = self.identifier(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')?;
        self.skip_ws();
        self.expect('(')?;

        let mut inputs = Map::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                break;
            }

            let key = self.identifier(|c| c.is_ascii_alphanumeric() || c == '_')?;
            self.skip_ws();
            self.expect('=')?;
            self.skip_ws();
            let value = self.value()?;
            inputs.insert(key.to_string(), value);

            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            break;
        }

        Ok(Action::new(name, inputs))
    }

    fn value(&mut self) -> HimsResult<Value> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.string(quote).map(Value::String)
            }
            Some('[') => {
                self.bump();
                self.list()
            }
            Some(_) => self.bare(),
            None => Err(self.error("expected a value")),
        }
    }

    fn string(&mut self, quote: char) -> HimsResult<String> {
        let mut out = String::new();

        while let Some(c) = self.bump() {
            match c {
                '\\' => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(escaped @ ('\\' | '\'' | '"')) => out.push(escaped),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }

        Err(self.error("unterminated string"))
    }

    fn list(&mut self) -> HimsResult<Value> {
        let mut items = Vec::new();

        loop {
            self.skip_ws();
            if self.eat(']') {
                break;
            }

            items.push(self.value()?);

            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(']')?;
            break;
        }

        Ok(Value::Array(items))
    }

    fn bare(&mut self) -> HimsResult<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | ')' | ']' | '(' | '[' | '=') {
                break;
            }
            self.bump();
        }

        let token = &self.src[start..self.pos];
        let value = match token {
            "" => return Err(self.error("expected a value")),
            "None" | "null" => Value::Null,
            "True" | "true" => Value::Bool(true),
            "False" | "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        };
        Ok(value)
    }

    fn identifier(&mut self, allowed: impl Fn(char) -> bool) -> HimsResult<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !allowed(c) {
                break;
            }
            self.bump();
        }

        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        Ok(&self.src[start..self.pos])
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, c: char) -> HimsResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {c:?}")))
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> HimsError {
        HimsError::ActionParse {
            offset: self.pos,
            message: message.to_string(),
        }
    }
}
