pub mod completions;
pub mod inspect;
pub mod list;
pub mod prune;
pub mod recover;
pub mod run;
pub mod verify_store;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use zorya_core::{CoreError, Pipeline, PipelineConfig};
use zorya_schema::BagStatus;
use zorya_store::RecordStore;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, String> {
    PipelineConfig::load(path).map_err(|e| e.to_string())
}

/// Load the configuration and open the pipeline, rolling back interrupted runs.
pub fn open_pipeline(path: &Path) -> Result<Pipeline, String> {
    let config = load_config(path)?;
    debug!("opening store at {}", config.store_dir.display());
    Pipeline::open(&config).map_err(|e| e.to_string())
}

/// The record store alone, without building any collaborators.
pub fn open_records(path: &Path) -> Result<RecordStore, String> {
    let layout = load_config(path)?.store_layout();
    debug!("opening records at {}", layout.root().display());
    layout
        .initialize()
        .map_err(|e| CoreError::from(e).to_string())?;
    Ok(RecordStore::new(layout))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_status(status: BagStatus) -> String {
    use console::Style;
    let text = status.as_str();
    if status.is_in_progress() {
        return Style::new().cyan().bold().apply_to(text).to_string();
    }
    match status {
        BagStatus::Delivered => Style::new().green().apply_to(text).to_string(),
        BagStatus::Archived => Style::new().blue().apply_to(text).to_string(),
        BagStatus::Fetched | BagStatus::Discovered => {
            Style::new().yellow().apply_to(text).to_string()
        }
        _ => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_status_keeps_the_label() {
        for status in BagStatus::ALL {
            assert!(colorize_status(status).contains(status.as_str()));
        }
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_CONFIG_ERROR);
        assert_ne!(EXIT_CONFIG_ERROR, EXIT_STORE_ERROR);
    }

    #[test]
    fn missing_config_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("zorya.toml")).unwrap_err();
        assert!(err.starts_with("configuration error:"), "{err}");
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
