//! # HIMS Core
//!
//! Core logic for the `health.*` execution surface of the GUI agent.
//!
//! This crate turns clinical dialogue, or explicit action payloads, into a
//! plain-text patient record store:
//! - [`extraction`]: label-anchored field extraction from free text
//! - [`identity`]: deterministic patient identifiers derived from names
//! - [`store`]: create-once demographics and append-only logs on disk
//! - [`dispatch`]: routing of `health.*` actions, ignoring all others
//! - [`action_text`]: reading `Action: health.fn(...)` calls from agent output
//!
//! **No UI or model concerns**: calling the model, executing GUI actions, and
//! process configuration belong to the binaries.

pub mod action_text;
pub mod config;
pub mod constants;
pub mod dialogue;
pub mod dispatch;
pub mod error;
pub mod extraction;
pub mod identity;
pub mod paths;
pub mod store;

pub use action_text::{parse_action_call, parse_actions, read_action_batch};
pub use config::{resolve_hims_root, CoreConfig};
pub use dialogue::DialogueInfo;
pub use dispatch::{
    execute_health_actions, Action, ActionDispatcher, DispatchSummary, HealthAction,
    UpsertPatient,
};
pub use error::{HimsError, HimsResult};
pub use extraction::extract;
pub use identity::{derive_pid, PatientId};
pub use store::{PatientSummary, RecordStore};

// Re-export the shared validated types.
pub use hims_types::{CalendarDate, NonEmptyText, TextError};
