//! `health.*` action dispatch.
//!
//! The dispatcher shares an action stream with other executors (GUI clicks,
//! key presses, ...). It handles the `health.` namespace and skips everything
//! else without error, so sibling executors can consume the same batch.
//!
//! | `action_type`                | effect                                            |
//! |------------------------------|---------------------------------------------------|
//! | `health.ensure_hims`         | create the collection directories                 |
//! | `health.extract_and_update`  | extract from `dialogue`, then upsert/appointment/imaging |
//! | `health.upsert_patient`      | same writes, from explicit fields                 |
//! | anything else                | skipped                                           |

use crate::config::CoreConfig;
use crate::constants::{HEALTH_ACTION_PREFIX, UNKNOWN};
use crate::dialogue::DialogueInfo;
use crate::error::{HimsError, HimsResult};
use crate::extraction::{extract, split_listish};
use crate::identity::PatientId;
use crate::store::RecordStore;
use hims_types::{CalendarDate, NonEmptyText};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// A generic action as produced by the upstream action parser.
///
/// Unknown keys are ignored when deserialising. A non-string `action_type`
/// reads as the empty string and a non-object `action_inputs` as an empty
/// mapping, so one foreign action never fails a whole batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub action_type: String,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub action_inputs: Map<String, Value>,
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*[\r\n]+[ \t]*").expect("line break pattern compiles"));

static FIELD_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*,[ \t]*").expect("field separator pattern compiles"));

/// Collapses every run of line breaks to one space, then trims.
fn single_line(raw: &str) -> String {
    LINE_BREAK_RE.replace_all(raw, " ").trim().to_string()
}

impl Action {
    pub fn new(action_type: impl Into<String>, action_inputs: Map<String, Value>) -> Self {
        Self {
            action_type: action_type.into(),
            action_inputs,
        }
    }

    /// Decodes a JSON array of actions.
    pub fn decode_batch(json: &str) -> HimsResult<Vec<Action>> {
        serde_json::from_str(json).map_err(HimsError::ActionDecode)
    }
}

/// Explicit fields of a `health.upsert_patient` action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpsertPatient {
    pub info: DialogueInfo,
    pub patient_id: Option<PatientId>,
}

impl UpsertPatient {
    /// Builds the record from keyword inputs.
    ///
    /// Blank strings count as absent. Line breaks inside a value collapse to
    /// a single space, and commas in `doctor` do too, so each value stays one
    /// field of one record line. `symptoms` may be a list of strings or a
    /// single list-like string. An unsafe `patient_id` or a malformed
    /// `appointment_date` is dropped with a warning.
    pub fn from_inputs(inputs: &Map<String, Value>) -> Self {
        let text = |key: &str| inputs.get(key).and_then(Value::as_str);
        let optional = |key: &str| text(key).map(single_line).and_then(NonEmptyText::optional);

        let patient_name = optional("patient_name")
            .map(|name| name.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let symptoms = match inputs.get("symptoms") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(single_line)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => split_listish(&single_line(s)),
            _ => Vec::new(),
        };

        let appointment_date = text("appointment_date")
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| match CalendarDate::parse(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    tracing::warn!("dropping appointment_date: {}", e);
                    None
                }
            });

        let patient_id = text("patient_id")
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| match PatientId::parse(raw) {
                Ok(pid) => Some(pid),
                Err(e) => {
                    tracing::warn!("ignoring patient_id, deriving from name instead: {}", e);
                    None
                }
            });

        Self {
            info: DialogueInfo {
                patient_name,
                symptoms,
                treatment_plan: text("treatment_plan")
                    .map(single_line)
                    .unwrap_or_default(),
                next_steps: optional("next_steps"),
                appointment_date,
                doctor: optional("doctor").and_then(|doctor| {
                    NonEmptyText::optional(FIELD_SEPARATOR_RE.replace_all(doctor.as_str(), " "))
                }),
                imaging: optional("imaging"),
            },
            patient_id,
        }
    }
}

/// The finite set of actions this module understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthAction {
    EnsureHims,
    ExtractAndUpdate { dialogue: String },
    UpsertPatient(Box<UpsertPatient>),
    /// Any other action type, lower-cased. Never an error.
    Other(String),
}

impl HealthAction {
    pub fn from_action(action: &Action) -> Self {
        let inputs = &action.action_inputs;

        match action.action_type.to_lowercase().as_str() {
            "health.ensure_hims" => HealthAction::EnsureHims,
            "health.extract_and_update" => HealthAction::ExtractAndUpdate {
                dialogue: inputs
                    .get("dialogue")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "health.upsert_patient" => {
                HealthAction::UpsertPatient(Box::new(UpsertPatient::from_inputs(inputs)))
            }
            other => HealthAction::Other(other.to_string()),
        }
    }
}

/// What one [`ActionDispatcher::execute`] call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Actions handled by this dispatcher.
    pub handled: usize,
    /// Actions left for other executors.
    pub skipped: usize,
    /// PIDs resolved by record-writing actions, in call order.
    pub patient_ids: Vec<PatientId>,
}

/// Routes `health.*` actions to the extractor and record store.
#[derive(Clone, Debug)]
pub struct ActionDispatcher {
    store: RecordStore,
}

impl ActionDispatcher {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Executes `actions` strictly in order.
    ///
    /// The collection directories are created on entry. Non-`health.` and
    /// unrecognised actions are skipped.
    ///
    /// # Errors
    ///
    /// Only filesystem faults escape. Writes made by earlier actions in the
    /// batch remain on disk.
    pub fn execute(&self, actions: &[Action]) -> HimsResult<DispatchSummary> {
        self.store.ensure_root()?;

        let mut summary = DispatchSummary::default();

        for action in actions {
            match HealthAction::from_action(action) {
                HealthAction::EnsureHims => self.store.ensure_root()?,
                HealthAction::ExtractAndUpdate { dialogue } => {
                    let info = extract(&dialogue);
                    summary.patient_ids.push(self.write_record(&info, None)?);
                }
                HealthAction::UpsertPatient(upsert) => {
                    let pid = self.write_record(&upsert.info, upsert.patient_id.as_ref())?;
                    summary.patient_ids.push(pid);
                }
                HealthAction::Other(kind) => {
                    if kind.starts_with(HEALTH_ACTION_PREFIX) {
                        tracing::debug!("skipping unrecognised health action {:?}", kind);
                    } else {
                        tracing::trace!("skipping non-health action {:?}", kind);
                    }
                    summary.skipped += 1;
                    continue;
                }
            }
            summary.handled += 1;
        }

        Ok(summary)
    }

    fn write_record(&self, info: &DialogueInfo, pid: Option<&PatientId>) -> HimsResult<PatientId> {
        let pid = self.store.upsert_patient(info, pid)?;
        self.store
            .record_appointment(&pid, info.appointment_date.as_ref(), info.doctor.as_ref())?;
        self.store.record_imaging(&pid, info.imaging.as_ref())?;
        Ok(pid)
    }
}

/// Executes `actions` against the store rooted at `root`.
///
/// Convenience entry point for callers that do not keep a dispatcher around.
pub fn execute_health_actions(
    actions: &[Action],
    root: impl Into<PathBuf>,
) -> HimsResult<DispatchSummary> {
    let cfg = Arc::new(CoreConfig::new(root.into())?);
    ActionDispatcher::new(RecordStore::new(cfg)).execute(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_text::read_action_batch;
    use crate::identity::derive_pid;
    use crate::paths::appointments::AppointmentsFile;
    use crate::paths::imaging::ImagingPlanFile;
    use crate::paths::patient::{DemographicsFile, SymptomsFile, TreatmentPlanFile};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const JANE_DOE: &str = "Patient: Jane Doe\nSymptoms: cough, fever for 3 days\nPlan: Give Amoxicillin 500mg TID for 5 days. Next: chest X-ray if no improvement.\nAppointment: 2025-09-12\nDoctor: Dr. Patel\nImaging: Chest X-ray";

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid date")
    }

    fn test_dispatcher(root: &Path) -> ActionDispatcher {
        let cfg = CoreConfig::new(root.to_path_buf()).expect("CoreConfig::new should succeed");
        ActionDispatcher::new(RecordStore::with_clock(Arc::new(cfg), fixed_today))
    }

    fn action(action_type: &str, inputs: Value) -> Action {
        match inputs {
            Value::Object(map) => Action::new(action_type, map),
            _ => Action::new(action_type, Map::new()),
        }
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn appointments(dispatcher: &ActionDispatcher) -> Vec<String> {
        lines(
            &dispatcher
                .store()
                .config()
                .appointments_dir()
                .join(AppointmentsFile::NAME),
        )
    }

    fn imaging(dispatcher: &ActionDispatcher) -> Vec<String> {
        lines(
            &dispatcher
                .store()
                .config()
                .imaging_dir()
                .join(ImagingPlanFile::NAME),
        )
    }

    #[test]
    fn test_extract_and_update_end_to_end() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        let summary = dispatcher
            .execute(&[action(
                "health.extract_and_update",
                json!({ "dialogue": JANE_DOE }),
            )])
            .expect("execute should succeed");

        let pid = derive_pid("Jane Doe");
        assert_eq!(summary.patient_ids, vec![pid.clone()]);
        assert_eq!(summary.handled, 1);

        let patient_dir = dispatcher.store().patient_dir(&pid);
        assert_eq!(
            lines(&patient_dir.join(DemographicsFile::NAME)),
            vec![format!("PatientID: {pid}"), "Name: Jane Doe".to_string()]
        );
        assert_eq!(
            lines(&patient_dir.join(SymptomsFile::NAME)),
            vec!["[2025-09-01] cough; fever for 3 days"]
        );
        assert_eq!(
            lines(&patient_dir.join(TreatmentPlanFile::NAME)),
            vec!["[2025-09-01] Plan: Give Amoxicillin 500mg TID for 5 days. | Next: chest X-ray if no improvement."]
        );
        assert_eq!(
            appointments(&dispatcher),
            vec![format!("2025-09-12, {pid}, Patel")]
        );
        assert_eq!(
            imaging(&dispatcher),
            vec![format!("[2025-09-01] {pid}: Chest X-ray")]
        );
    }

    #[test]
    fn test_extract_and_update_with_empty_dialogue() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        // Missing "dialogue" behaves like an empty string.
        dispatcher
            .execute(&[action("health.extract_and_update", json!({}))])
            .expect("execute should succeed");

        let pid = derive_pid(UNKNOWN);
        let patient_dir = dispatcher.store().patient_dir(&pid);
        assert!(patient_dir.join(DemographicsFile::NAME).is_file());
        assert!(!patient_dir.join(SymptomsFile::NAME).exists());
        assert!(!patient_dir.join(TreatmentPlanFile::NAME).exists());
        assert!(appointments(&dispatcher).is_empty());
        assert!(imaging(&dispatcher).is_empty());
    }

    #[test]
    fn test_non_health_actions_have_no_effect() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        let actions = [
            action("click", json!({ "start_box": "(10,20)" })),
            action(
                "health.upsert_patient",
                json!({ "patient_name": "Alex Kim", "imaging": "MRI knee" }),
            ),
            action("type", json!({ "content": "Patient: Mallory\nImaging: CT head" })),
            action("Health.Extract_And_Update", json!({ "dialogue": "Patient: Bo Lee\nScan: X-ray hand" })),
            action("health.unknown_thing", json!({ "patient_name": "Nobody" })),
            action("finished", json!({})),
        ];

        let summary = dispatcher.execute(&actions).expect("execute should succeed");

        assert_eq!(summary.handled, 2);
        assert_eq!(summary.skipped, 4);
        assert_eq!(
            summary.patient_ids,
            vec![derive_pid("Alex Kim"), derive_pid("Bo Lee")]
        );
        assert_eq!(
            imaging(&dispatcher),
            vec![
                format!("[2025-09-01] {}: MRI knee", derive_pid("Alex Kim")),
                format!("[2025-09-01] {}: X-ray hand", derive_pid("Bo Lee")),
            ]
        );

        let patient_dirs = fs::read_dir(dispatcher.store().config().patients_dir())
            .unwrap()
            .count();
        assert_eq!(patient_dirs, 2);
    }

    #[test]
    fn test_upsert_patient_honours_explicit_id() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        let summary = dispatcher
            .execute(&[action(
                "health.upsert_patient",
                json!({
                    "patient_id": "P002_JohnsonMichael",
                    "patient_name": "Michael Johnson",
                    "symptoms": ["snoring", " ", "daytime sleepiness"],
                    "treatment_plan": "Sleep study referral",
                    "next_steps": "",
                    "appointment_date": "2025-01-16",
                    "doctor": null,
                }),
            )])
            .expect("execute should succeed");

        let pid = PatientId::parse("P002_JohnsonMichael").unwrap();
        assert_eq!(summary.patient_ids, vec![pid.clone()]);

        let patient_dir = dispatcher.store().patient_dir(&pid);
        assert_eq!(
            lines(&patient_dir.join(SymptomsFile::NAME)),
            vec!["[2025-09-01] snoring; daytime sleepiness"]
        );
        assert_eq!(
            lines(&patient_dir.join(TreatmentPlanFile::NAME)),
            vec!["[2025-09-01] Plan: Sleep study referral"]
        );
        assert_eq!(
            appointments(&dispatcher),
            vec!["2025-01-16, P002_JohnsonMichael, Unknown"]
        );
    }

    #[test]
    fn test_upsert_patient_with_unsafe_id_falls_back_to_derived() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        let summary = dispatcher
            .execute(&[action(
                "health.upsert_patient",
                json!({ "patient_id": "../../etc", "patient_name": "Eve Stone" }),
            )])
            .expect("execute should succeed");

        assert_eq!(summary.patient_ids, vec![derive_pid("Eve Stone")]);
        assert!(!temp_dir.path().join("etc").exists());
    }

    #[test]
    fn test_upsert_patient_inputs_are_lenient() {
        let inputs = json!({
            "patient_name": "   ",
            "symptoms": "itch, redness and swelling",
            "appointment_date": "next tuesday",
            "doctor": 42,
            "imaging": "  ",
        });
        let upsert = UpsertPatient::from_inputs(inputs.as_object().unwrap());

        assert_eq!(upsert.info.patient_name, UNKNOWN);
        assert_eq!(upsert.info.symptoms, vec!["itch", "redness", "swelling"]);
        assert_eq!(upsert.info.appointment_date, None);
        assert_eq!(upsert.info.doctor, None);
        assert_eq!(upsert.info.imaging, None);
        assert_eq!(upsert.patient_id, None);
    }

    #[test]
    fn test_repeated_actions_append_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        let actions = [
            action("health.ensure_hims", json!({})),
            action(
                "health.extract_and_update",
                json!({ "dialogue": "Patient: Jane Doe\nSymptoms: cough" }),
            ),
            action(
                "health.upsert_patient",
                json!({ "patient_name": "Jane  Doe", "symptoms": ["fever"] }),
            ),
        ];
        dispatcher.execute(&actions).expect("execute should succeed");

        let pid = derive_pid("Jane Doe");
        assert_eq!(
            lines(&dispatcher.store().patient_dir(&pid).join(SymptomsFile::NAME)),
            vec!["[2025-09-01] cough", "[2025-09-01] fever"]
        );
    }

    #[test]
    fn test_decode_batch_ignores_extra_keys_and_null_inputs() {
        let json = r#"[
            {"action_type": "health.ensure_hims", "action_inputs": null, "reflection": "x"},
            {"action_type": "click", "action_inputs": {"start_box": "[1, 2]"}},
            {"action_inputs": {}}
        ]"#;

        let actions = Action::decode_batch(json).expect("decode should succeed");

        assert_eq!(actions.len(), 3);
        assert!(actions[0].action_inputs.is_empty());
        assert_eq!(HealthAction::from_action(&actions[0]), HealthAction::EnsureHims);
        assert_eq!(
            HealthAction::from_action(&actions[2]),
            HealthAction::Other(String::new())
        );
    }

    #[test]
    fn test_decode_batch_tolerates_malformed_foreign_actions() {
        let json = r#"[
            {"action_type": "click", "action_inputs": "x"},
            {"action_type": null, "action_inputs": [1, 2]},
            {"action_type": 7},
            {"action_type": "health.ensure_hims", "action_inputs": {}}
        ]"#;

        let actions = read_action_batch(json).expect("decode should succeed");

        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0].action_type, "click");
        assert!(actions[0].action_inputs.is_empty());
        assert_eq!(actions[1].action_type, "");
        assert!(actions[1].action_inputs.is_empty());
        assert_eq!(actions[2].action_type, "");

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());
        let summary = dispatcher.execute(&actions).expect("execute should succeed");

        assert_eq!(summary.handled, 1);
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn test_upsert_patient_keeps_one_line_per_record() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dispatcher = test_dispatcher(temp_dir.path());

        let upsert = action(
            "health.upsert_patient",
            json!({
                "patient_name": "Jane\nDoe",
                "symptoms": ["cough\r\nfever"],
                "treatment_plan": "Rest\n\nfluids",
                "next_steps": "review\nbloods",
                "appointment_date": "2025-01-01",
                "doctor": "Patel, Cardiology",
                "imaging": "CT\nchest",
            }),
        );
        let summary = dispatcher
            .execute(&[upsert.clone(), upsert])
            .expect("execute should succeed");

        let pid = derive_pid("Jane Doe");
        assert_eq!(summary.patient_ids, vec![pid.clone(), pid.clone()]);

        let patient_dir = dispatcher.store().patient_dir(&pid);
        assert_eq!(
            lines(&patient_dir.join(DemographicsFile::NAME)),
            vec![format!("PatientID: {pid}"), "Name: Jane Doe".to_string()]
        );
        assert_eq!(
            lines(&patient_dir.join(SymptomsFile::NAME)),
            vec!["[2025-09-01] cough fever"; 2]
        );
        assert_eq!(
            lines(&patient_dir.join(TreatmentPlanFile::NAME)),
            vec!["[2025-09-01] Plan: Rest fluids | Next: review bloods"; 2]
        );

        let appointments = appointments(&dispatcher);
        assert_eq!(appointments.len(), 2);
        assert_eq!(
            appointments[0].split(", ").collect::<Vec<_>>(),
            vec!["2025-01-01", pid.as_str(), "Patel Cardiology"]
        );
        assert_eq!(
            imaging(&dispatcher),
            vec![format!("[2025-09-01] {pid}: CT chest"); 2]
        );
    }

    #[test]
    fn test_decode_batch_rejects_non_array() {
        let err = Action::decode_batch("{\"action_type\": 1}").expect_err("should fail");
        assert!(matches!(err, HimsError::ActionDecode(_)));
    }

    #[test]
    fn test_execute_health_actions_uses_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("HIMS");

        let summary = execute_health_actions(&[], &root).expect("execute should succeed");

        assert_eq!(summary, DispatchSummary::default());
        assert!(root.join("Patients").is_dir());
        assert!(root.join("Appointments").is_dir());
        assert!(root.join("Imaging").is_dir());
    }
}
