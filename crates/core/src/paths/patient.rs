//! Per-patient file names.
//!
//! Each lives directly under `Patients/<PID>/`.

/// Demographics file, written once on first encounter.
pub struct DemographicsFile;

impl DemographicsFile {
    pub const NAME: &'static str = "demographics.txt";
}

/// Symptom history, one timestamped line per event.
pub struct SymptomsFile;

impl SymptomsFile {
    pub const NAME: &'static str = "symptoms.txt";
}

/// Treatment plan history, one timestamped line per event.
pub struct TreatmentPlanFile;

impl TreatmentPlanFile {
    pub const NAME: &'static str = "treatment_plan.txt";
}
