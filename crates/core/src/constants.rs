//! Constants used throughout the HIMS core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default HIMS root when no explicit directory is configured.
pub const DEFAULT_HIMS_ROOT: &str = "HIMS";

/// Directory name for the per-patient collection.
pub const PATIENTS_DIR_NAME: &str = "Patients";

/// Directory name for the global appointments log.
pub const APPOINTMENTS_DIR_NAME: &str = "Appointments";

/// Directory name for the global imaging log.
pub const IMAGING_DIR_NAME: &str = "Imaging";

/// Sentinel used when no patient name or doctor is known.
pub const UNKNOWN: &str = "Unknown";

/// Format of the `[YYYY-MM-DD]` prefix on timestamped lines.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Namespace prefix of every action this crate handles.
pub const HEALTH_ACTION_PREFIX: &str = "health.";
