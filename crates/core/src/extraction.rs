//! Heuristic field extraction from clinical dialogue.
//!
//! Each field has one label-anchored, case-insensitive pattern. Patterns scan
//! the whole text independently of each other and the first match in document
//! order wins. A field with no match is left empty; extraction itself never
//! fails.
//!
//! | Field            | Labels                                       |
//! |------------------|----------------------------------------------|
//! | patient name     | `Patient`, `Pt`, `Name`                      |
//! | symptoms         | `Symptom(s)`, `C/O`, `Complains of`          |
//! | treatment plan   | `Plan`, `Treatment plan`, `Assessment/Plan`  |
//! | appointment date | `Appointment`, `Follow-up`/`Followup`/`Follow up` |
//! | doctor           | `Doctor`, `Dr.`                              |
//! | imaging          | `Imaging`, `Scan`, `Order`                   |
//!
//! Every label is followed by `:` or `-`. Captured values never cross a line
//! break.

use crate::constants::UNKNOWN;
use crate::dialogue::DialogueInfo;
use hims_types::{CalendarDate, NonEmptyText};
use once_cell::sync::Lazy;
use regex::Regex;

static PATIENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Patient|Pt|Name)[ \t]*[:\-][ \t]*([A-Za-z][A-Za-z \t\-']*)")
        .expect("patient pattern compiles")
});

static SYMPTOM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Symptoms?|C/O|Complains of)[ \t]*[:\-][ \t]*(.+)")
        .expect("symptom pattern compiles")
});

static PLAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Assessment/Plan|Treatment plan|Plan)[ \t]*[:\-][ \t]*(.+)")
        .expect("plan pattern compiles")
});

static APPOINTMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Appointment|Follow[- ]?up)[ \t]*[:\-][ \t]*([0-9]{4}-[0-9]{2}-[0-9]{2})")
        .expect("appointment pattern compiles")
});

static DOCTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Doctor|Dr\.)[ \t]*[:\-][ \t]*([A-Za-z.\-' \t]+)")
        .expect("doctor pattern compiles")
});

static IMAGING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Imaging|Scan|Order)[ \t]*[:\-][ \t]*(.+)")
        .expect("imaging pattern compiles")
});

static NEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnext\b[ \t]*[:\-]?").expect("next pattern compiles"));

static LIST_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[;,•]| and ").expect("list separator pattern compiles"));

// Honorific left in the capture by lines such as "Doctor: Dr. Patel".
static HONORIFIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:dr\.[ \t]*|dr[ \t]+)").expect("honorific pattern compiles"));

/// Extracts a [`DialogueInfo`] from free-text dialogue.
///
/// Fields degrade independently: an unmatched label leaves its field empty
/// (or `"Unknown"` for the patient name) without affecting the others.
pub fn extract(text: &str) -> DialogueInfo {
    let patient_name = first_capture(&PATIENT_RE, text)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    let symptoms = first_capture(&SYMPTOM_RE, text)
        .map(split_listish)
        .unwrap_or_default();

    let (treatment_plan, next_steps) = first_capture(&PLAN_RE, text)
        .map(split_plan)
        .unwrap_or_default();

    let appointment_date =
        first_capture(&APPOINTMENT_RE, text).and_then(|date| CalendarDate::parse(date).ok());

    let doctor = first_capture(&DOCTOR_RE, text)
        .map(|doctor| HONORIFIC_RE.replace(doctor.trim(), ""))
        .and_then(NonEmptyText::optional);

    let imaging = first_capture(&IMAGING_RE, text).and_then(NonEmptyText::optional);

    let info = DialogueInfo {
        patient_name,
        symptoms,
        treatment_plan,
        next_steps,
        appointment_date,
        doctor,
        imaging,
    };

    tracing::debug!(
        "extracted dialogue: patient={}, symptoms={}, plan={}, next={}, appointment={}, doctor={}, imaging={}",
        info.patient_name,
        info.symptoms.len(),
        !info.treatment_plan.is_empty(),
        info.next_steps.is_some(),
        info.appointment_date.is_some(),
        info.doctor.is_some(),
        info.imaging.is_some(),
    );

    info
}

/// Splits a list-like phrase on `;`, `,`, `•` and `" and "`.
///
/// Fragments are trimmed and empty ones dropped; order is preserved.
pub fn split_listish(s: &str) -> Vec<String> {
    LIST_SEPARATOR_RE
        .split(s)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits a plan at the first whole word "next" into plan and next steps.
///
/// An optional `:` or `-` after the word is consumed. Without the
/// word the whole (trimmed) text is the plan.
pub fn split_plan(plan: &str) -> (String, Option<NonEmptyText>) {
    match NEXT_RE.find(plan) {
        Some(m) => (
            plan[..m.start()].trim().to_string(),
            NonEmptyText::optional(&plan[m.end()..]),
        ),
        None => (plan.trim().to_string(), None),
    }
}

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
