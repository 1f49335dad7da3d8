use super::{json_pretty, load_config, EXIT_STORE_ERROR, EXIT_SUCCESS};
use std::path::Path;
use zorya_core::CoreError;
use zorya_store::verify_store_integrity;

pub fn run(config: &Path, json: bool) -> Result<u8, String> {
    let layout = load_config(config)?.store_layout();
    let report = verify_store_integrity(&layout).map_err(|e| CoreError::from(e).to_string())?;

    if json {
        let payload = serde_json::json!({
            "checked": report.records_checked,
            "passed": report.records_passed,
            "failed": report.failed.len(),
            "pending_claims": report.pending_claims,
            "in_progress": report.in_progress,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "store integrity: {}/{} records passed",
            report.records_passed, report.records_checked
        );
        for f in &report.failed {
            println!("  FAIL {}: {}", f.identifier, f.reason);
        }
        if report.pending_claims > 0 {
            println!(
                "  {} interrupted claim(s) pending; run `zorya recover`",
                report.pending_claims
            );
        }
        for id in &report.in_progress {
            println!("  IN PROGRESS {id}");
        }
    }

    if report.failed.is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_STORE_ERROR)
    }
}
