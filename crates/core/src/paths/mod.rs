//! On-disk path definitions for HIMS artefacts.
//!
//! This module defines relative filesystem names for patient records and the
//! global logs. It contains **no I/O logic** - only typed name constants.

pub mod appointments;
pub mod imaging;
pub mod patient;
