use clap::{Parser, Subcommand};
use hims_core::{
    derive_pid, extract, read_action_batch, resolve_hims_root, Action, ActionDispatcher,
    CoreConfig, RecordStore,
};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hims")]
#[command(about = "HIMS patient record store CLI")]
struct Cli {
    /// HIMS root directory
    #[arg(long, global = true, env = "HIMS_ROOT")]
    root: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the Patients, Appointments and Imaging directories
    Init,
    /// Print the patient ID derived from a name
    Pid {
        /// Patient name
        name: String,
    },
    /// Extract structured fields from dialogue and print them as JSON
    Extract {
        /// Dialogue file (stdin if omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Extract from dialogue and update the record store
    Ingest {
        /// Dialogue file (stdin if omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Update a patient record from explicit fields
    Upsert {
        /// Patient name
        #[arg(long)]
        name: String,
        /// Symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
        /// Treatment plan
        #[arg(long)]
        plan: Option<String>,
        /// Next steps
        #[arg(long)]
        next: Option<String>,
        /// Appointment date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Doctor
        #[arg(long)]
        doctor: Option<String>,
        /// Imaging order
        #[arg(long)]
        imaging: Option<String>,
        /// Explicit patient ID (derived from the name if omitted)
        #[arg(long)]
        patient_id: Option<String>,
    },
    /// List all patients
    List,
    /// Execute an action batch (JSON array or `Action:` lines)
    Apply {
        /// Batch file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = Arc::new(CoreConfig::new(resolve_hims_root(cli.root))?);
    let dispatcher = ActionDispatcher::new(RecordStore::new(cfg.clone()));

    match cli.command {
        Some(Commands::Init) => {
            dispatcher.store().ensure_root()?;
            println!("Initialised HIMS root at {}", cfg.hims_root().display());
        }
        Some(Commands::Pid { name }) => {
            println!("{}", derive_pid(&name));
        }
        Some(Commands::Extract { file }) => {
            let info = extract(&read_input(file)?);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Some(Commands::Ingest { file }) => {
            let dialogue = read_input(file)?;
            let health_action = action(
                "health.extract_and_update",
                json!({ "dialogue": dialogue }),
            );
            let summary = dispatcher.execute(&[health_action])?;
            for pid in summary.patient_ids {
                println!("Updated patient {}", pid);
            }
        }
        Some(Commands::Upsert {
            name,
            symptoms,
            plan,
            next,
            date,
            doctor,
            imaging,
            patient_id,
        }) => {
            let health_action = action(
                "health.upsert_patient",
                json!({
                    "patient_name": name,
                    "symptoms": symptoms,
                    "treatment_plan": plan,
                    "next_steps": next,
                    "appointment_date": date,
                    "doctor": doctor,
                    "imaging": imaging,
                    "patient_id": patient_id,
                }),
            );
            let summary = dispatcher.execute(&[health_action])?;
            for pid in summary.patient_ids {
                println!("Updated patient {}", pid);
            }
        }
        Some(Commands::List) => {
            let patients = dispatcher.store().list_patients();
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!("ID: {}, Name: {}", patient.patient_id, patient.name);
                }
            }
        }
        Some(Commands::Apply { file }) => {
            let actions = read_action_batch(&std::fs::read_to_string(&file)?)?;
            let summary = dispatcher.execute(&actions)?;
            println!(
                "Handled {} health action(s), skipped {} other action(s)",
                summary.handled, summary.skipped
            );
        }
        None => {
            println!("Use 'hims --help' for commands");
        }
    }

    Ok(())
}

fn action(action_type: &str, inputs: Value) -> Action {
    let inputs = match inputs {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Action::new(action_type, inputs)
}

fn read_input(file: Option<PathBuf>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
