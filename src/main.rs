use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hims_core::{ActionDispatcher, CoreConfig, RecordStore, read_action_batch, resolve_hims_root};

/// Batch runner for `health.*` actions.
///
/// Reads one agent response (text with `Action:` lines) or a JSON array of
/// `{action_type, action_inputs}` records, executes every `health.*` action
/// against the record store and leaves all other actions untouched.
///
/// # Environment Variables
/// - `HIMS_ROOT`: record store root (default: "HIMS")
/// - `HIMS_ACTIONS_FILE`: file to read the batch from (default: stdin)
/// - `RUST_LOG`: log filter, on top of `hims=info`
///
/// # Returns
/// * `Ok(())` - If every health action was applied
/// * `Err(anyhow::Error)` - If the batch cannot be read or a record file cannot be written
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hims=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let hims_root = resolve_hims_root(std::env::var("HIMS_ROOT").ok());
    let cfg = Arc::new(CoreConfig::new(hims_root)?);

    let input = match std::env::var("HIMS_ACTIONS_FILE") {
        Ok(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read actions file {path}"))?,
        Err(_) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read actions from stdin")?;
            buf
        }
    };

    let actions = read_action_batch(&input)?;
    tracing::info!(
        "++ Running {} action(s) against {}",
        actions.len(),
        cfg.hims_root().display()
    );

    let dispatcher = ActionDispatcher::new(RecordStore::new(cfg));
    let summary = dispatcher.execute(&actions)?;

    for pid in &summary.patient_ids {
        tracing::info!("updated patient {}", pid);
    }
    tracing::info!(
        "-- Handled {} health action(s), left {} for other executors",
        summary.handled,
        summary.skipped
    );

    Ok(())
}
