//! Patient identifiers.
//!
//! A PID is derived from the patient's name and is the only key joining a
//! patient's demographics, symptom and plan history, appointments and imaging
//! orders. There is no index file: the directory `Patients/<PID>/` is the
//! index entry.
//!
//! ## Format
//!
//! `P<3 digits>_<AlnumName>`, for example `P701_JaneDoe`.
//!
//! - `AlnumName` is the name with everything outside `[A-Za-z0-9]` removed
//!   (`"Unknown"` if nothing is left).
//! - The digits are the first eight bytes of `SHA-256(AlnumName)` read as a
//!   big-endian integer, modulo 1000.
//!
//! The derivation is a pure function of the normalised name, so a PID is
//! stable across processes and machines. Directories written by one run are
//! found again by the next.

use crate::constants::UNKNOWN;
use crate::{HimsError, HimsResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Maximum accepted length of an explicitly supplied identifier.
const MAX_PATIENT_ID_LEN: usize = 128;

/// A patient identifier that is safe to use as a single directory name.
///
/// # Construction
/// - [`derive_pid`] builds one from a patient name.
/// - [`PatientId::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientId(String);

impl PatientId {
    /// Validates an explicitly supplied identifier.
    ///
    /// Only ASCII alphanumerics, `_` and `-` are accepted, so the value can
    /// never name a path outside `Patients/`.
    ///
    /// # Errors
    ///
    /// Returns [`HimsError::InvalidInput`] for empty, overlong, or unsafe input.
    pub fn parse(input: &str) -> HimsResult<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(HimsError::InvalidInput("patient_id cannot be empty".into()));
        }

        if input.len() > MAX_PATIENT_ID_LEN {
            return Err(HimsError::InvalidInput(format!(
                "patient_id exceeds maximum length of {} characters",
                MAX_PATIENT_ID_LEN
            )));
        }

        let ok = input
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'));

        if !ok {
            return Err(HimsError::InvalidInput(format!(
                "patient_id {input:?} contains invalid characters (only alphanumeric, '_', '-' allowed)"
            )));
        }

        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory holding this patient's files under `patients_dir`.
    pub fn dir(&self, patients_dir: &Path) -> PathBuf {
        patients_dir.join(&self.0)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Removes every character outside `[A-Za-z0-9]`, substituting `"Unknown"`
/// for an empty result.
pub fn normalise_name(name: &str) -> String {
    let normalised: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    if normalised.is_empty() {
        UNKNOWN.to_string()
    } else {
        normalised
    }
}

/// Derives the patient identifier for `name`.
pub fn derive_pid(name: &str) -> PatientId {
    let normalised = normalise_name(name);

    let digest = Sha256::digest(normalised.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let number = u64::from_be_bytes(prefix) % 1000;

    PatientId(format!("P{number:03}_{normalised}"))
}
