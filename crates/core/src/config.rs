//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The library never reads process-wide environment variables
//! itself; binaries resolve `HIMS_ROOT` and hand the result to [`CoreConfig::new`].

use crate::constants::{
    APPOINTMENTS_DIR_NAME, DEFAULT_HIMS_ROOT, IMAGING_DIR_NAME, PATIENTS_DIR_NAME,
};
use crate::{HimsError, HimsResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    hims_root: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig` rooted at `hims_root`.
    ///
    /// Nothing is created on disk; see [`crate::RecordStore::ensure_root`].
    pub fn new(hims_root: PathBuf) -> HimsResult<Self> {
        if hims_root.as_os_str().is_empty() {
            return Err(HimsError::InvalidInput("hims_root cannot be empty".into()));
        }

        Ok(Self { hims_root })
    }

    pub fn hims_root(&self) -> &Path {
        &self.hims_root
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.hims_root.join(PATIENTS_DIR_NAME)
    }

    pub fn appointments_dir(&self) -> PathBuf {
        self.hims_root.join(APPOINTMENTS_DIR_NAME)
    }

    pub fn imaging_dir(&self) -> PathBuf {
        self.hims_root.join(IMAGING_DIR_NAME)
    }
}

/// Resolve the HIMS root from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_HIMS_ROOT`].
pub fn resolve_hims_root(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HIMS_ROOT))
}
