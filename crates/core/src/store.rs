//! File-based patient record store.
//!
//! This module maps [`DialogueInfo`] records onto a fixed directory layout
//! under the configured HIMS root:
//!
//! ```text
//! <root>/
//!   Patients/
//!     <PID>/
//!       demographics.txt     # created once, never rewritten
//!       symptoms.txt         # append-only, "[YYYY-MM-DD] a; b"
//!       treatment_plan.txt   # append-only, "[YYYY-MM-DD] Plan: p | Next: n"
//!   Appointments/
//!     appointments.txt       # append-only, "YYYY-MM-DD, <PID>, <doctor>"
//!   Imaging/
//!     imaging_plan.txt       # append-only, "[YYYY-MM-DD] <PID>: <order>"
//! ```
//!
//! ## Write semantics
//!
//! - Demographics are first-write-wins: a later record with a different name
//!   for the same PID leaves the stored name untouched.
//! - Every other file only grows. Nothing here deletes or compacts a line.
//! - Missing optional data skips the corresponding write silently.
//! - Filesystem faults propagate; writes made before a fault stay on disk.
//!
//! There is no locking. Concurrent writers against the same root may
//! interleave lines.

use crate::config::CoreConfig;
use crate::constants::{DATE_FORMAT, UNKNOWN};
use crate::dialogue::DialogueInfo;
use crate::error::{HimsError, HimsResult};
use crate::identity::{derive_pid, PatientId};
use crate::paths::appointments::AppointmentsFile;
use crate::paths::imaging::ImagingPlanFile;
use crate::paths::patient::{DemographicsFile, SymptomsFile, TreatmentPlanFile};
use chrono::{Local, NaiveDate};
use hims_types::{CalendarDate, NonEmptyText};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A patient as read back from `demographics.txt`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub patient_id: String,
    pub name: String,
}

/// Service for reading and mutating the HIMS record store.
///
/// Timestamped lines use the calendar date at the moment of the write. Tests
/// substitute a fixed date through [`RecordStore::with_clock`].
#[derive(Clone, Debug)]
pub struct RecordStore {
    cfg: Arc<CoreConfig>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl RecordStore {
    /// Creates a store using the local calendar date for timestamps.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self::with_clock(cfg, local_today)
    }

    /// Creates a store with an injected source for the current date.
    pub fn with_clock(cfg: Arc<CoreConfig>, today: fn() -> NaiveDate) -> Self {
        Self { cfg, today }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Directory holding the files for `pid`.
    pub fn patient_dir(&self, pid: &PatientId) -> PathBuf {
        pid.dir(&self.cfg.patients_dir())
    }

    /// Creates the `Patients`, `Appointments` and `Imaging` collections.
    ///
    /// Idempotent: existing directories are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`HimsError::StorageDirCreation`] if a directory cannot be created.
    pub fn ensure_root(&self) -> HimsResult<()> {
        for dir in [
            self.cfg.patients_dir(),
            self.cfg.appointments_dir(),
            self.cfg.imaging_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(HimsError::StorageDirCreation)?;
        }
        Ok(())
    }

    /// Creates or extends the per-patient record for `info`.
    ///
    /// The PID is `pid` when given, otherwise derived from `info.patient_name`.
    /// The patient directory and `demographics.txt` are created on first
    /// encounter only. A symptoms line is appended when `info.symptoms` is
    /// non-empty, and a plan line when a plan or next steps are present.
    ///
    /// # Returns
    ///
    /// The resolved PID, for reuse in the appointment and imaging calls.
    ///
    /// # Errors
    ///
    /// Returns `HimsError` if:
    /// - the patient directory cannot be created,
    /// - any record file cannot be written.
    pub fn upsert_patient(
        &self,
        info: &DialogueInfo,
        pid: Option<&PatientId>,
    ) -> HimsResult<PatientId> {
        let pid = pid
            .cloned()
            .unwrap_or_else(|| derive_pid(&info.patient_name));
        let patient_dir = self.patient_dir(&pid);
        fs::create_dir_all(&patient_dir).map_err(HimsError::PatientDirCreation)?;

        self.write_demographics_once(&patient_dir, &pid, &info.patient_name)?;

        let today = self.today_stamp();

        if !info.symptoms.is_empty() {
            let line = format!("[{today}] {}", info.symptoms.join("; "));
            append_line(&patient_dir.join(SymptomsFile::NAME), &line)?;
        }

        if info.has_plan() {
            let mut line = format!("[{today}] Plan: {}", info.treatment_plan);
            if let Some(next) = &info.next_steps {
                line.push_str(&format!(" | Next: {next}"));
            }
            append_line(&patient_dir.join(TreatmentPlanFile::NAME), &line)?;
        }

        Ok(pid)
    }

    /// Appends `<date>, <pid>, <doctor>` to the global appointments log.
    ///
    /// No-op when `date` is `None`. A missing doctor is written as `Unknown`.
    pub fn record_appointment(
        &self,
        pid: &PatientId,
        date: Option<&CalendarDate>,
        doctor: Option<&NonEmptyText>,
    ) -> HimsResult<()> {
        let Some(date) = date else {
            return Ok(());
        };
        let doctor = doctor.map(NonEmptyText::as_str).unwrap_or(UNKNOWN);

        let path = self.cfg.appointments_dir().join(AppointmentsFile::NAME);
        append_line(&path, &format!("{date}, {pid}, {doctor}"))
    }

    /// Appends `[<today>] <pid>: <imaging>` to the global imaging log.
    ///
    /// No-op when `imaging` is `None`.
    pub fn record_imaging(&self, pid: &PatientId, imaging: Option<&NonEmptyText>) -> HimsResult<()> {
        let Some(imaging) = imaging else {
            return Ok(());
        };

        let path = self.cfg.imaging_dir().join(ImagingPlanFile::NAME);
        append_line(&path, &format!("[{}] {pid}: {imaging}", self.today_stamp()))
    }

    /// Lists every patient with a readable `demographics.txt`.
    ///
    /// Directory presence under `Patients/` is the index. Entries that are not
    /// directories or lack a demographics file are skipped; unparsable files
    /// are logged as warnings and skipped. Sorted by patient ID.
    pub fn list_patients(&self) -> Vec<PatientSummary> {
        let mut patients = Vec::new();

        let entries = match fs::read_dir(self.cfg.patients_dir()) {
            Ok(it) => it,
            Err(_) => return patients,
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }

            let demographics_path = dir.join(DemographicsFile::NAME);
            if !demographics_path.is_file() {
                continue;
            }

            match fs::read_to_string(&demographics_path) {
                Ok(contents) => match parse_demographics(&contents) {
                    Some(summary) => patients.push(summary),
                    None => tracing::warn!(
                        "failed to parse demographics: {}",
                        demographics_path.display()
                    ),
                },
                Err(e) => tracing::warn!(
                    "failed to read demographics: {} - {}",
                    demographics_path.display(),
                    e
                ),
            }
        }

        patients.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        patients
    }

    fn write_demographics_once(
        &self,
        patient_dir: &Path,
        pid: &PatientId,
        name: &str,
    ) -> HimsResult<()> {
        let path = patient_dir.join(DemographicsFile::NAME);

        // create_new makes the existence check and the create a single step.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(HimsError::FileWrite(e)),
        };

        file.write_all(format!("PatientID: {pid}\nName: {name}\n").as_bytes())
            .map_err(HimsError::FileWrite)?;

        tracing::info!("created patient record {}", pid);
        Ok(())
    }

    fn today_stamp(&self) -> String {
        (self.today)().format(DATE_FORMAT).to_string()
    }
}

fn append_line(path: &Path, line: &str) -> HimsResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(HimsError::FileWrite)?;

    file.write_all(format!("{line}\n").as_bytes())
        .map_err(HimsError::FileWrite)?;

    tracing::debug!("appended to {}", path.display());
    Ok(())
}

fn parse_demographics(contents: &str) -> Option<PatientSummary> {
    let mut patient_id = None;
    let mut name = None;

    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("PatientID: ") {
            patient_id.get_or_insert_with(|| value.to_string());
        } else if let Some(value) = line.strip_prefix("Name: ") {
            name.get_or_insert_with(|| value.to_string());
        }
    }

    Some(PatientSummary {
        patient_id: patient_id?,
        name: name?,
    })
}
