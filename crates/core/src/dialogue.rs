//! The structured record produced from one piece of clinical dialogue.

use crate::constants::UNKNOWN;
use hims_types::{CalendarDate, NonEmptyText};
use serde::{Deserialize, Serialize};

/// Structured fields pulled out of a dialogue or supplied explicitly.
///
/// Built fresh for every extraction and never persisted as a whole; the
/// record store writes its fields into the per-patient and global files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueInfo {
    pub patient_name: String,
    /// In the order they appeared in the source text.
    pub symptoms: Vec<String>,
    /// May be empty.
    pub treatment_plan: String,
    pub next_steps: Option<NonEmptyText>,
    pub appointment_date: Option<CalendarDate>,
    pub doctor: Option<NonEmptyText>,
    pub imaging: Option<NonEmptyText>,
}

impl DialogueInfo {
    /// A record with only a patient name set.
    pub fn named(patient_name: impl Into<String>) -> Self {
        Self {
            patient_name: patient_name.into(),
            ..Self::default()
        }
    }

    /// Whether a treatment plan line should be written for this record.
    pub fn has_plan(&self) -> bool {
        !self.treatment_plan.is_empty() || self.next_steps.is_some()
    }
}

impl Default for DialogueInfo {
    fn default() -> Self {
        Self {
            patient_name: UNKNOWN.to_string(),
            symptoms: Vec::new(),
            treatment_plan: String::new(),
            next_steps: None,
            appointment_date: None,
            doctor: None,
            imaging: None,
        }
    }
}
