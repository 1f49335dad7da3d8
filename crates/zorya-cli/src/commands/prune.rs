use super::{json_pretty, open_pipeline, EXIT_SUCCESS};
use std::path::Path;
use zorya_core::shutdown_requested;

pub fn run(config: &Path, dry_run: bool, json: bool) -> Result<u8, String> {
    let pipeline = open_pipeline(config)?;
    let report = pipeline
        .prune(dry_run, shutdown_requested)
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "dry_run": dry_run,
            "orphaned_paths": report.orphaned_paths,
            "stale_partials": report.stale_partials,
            "removed": report.removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let found = report.orphaned_paths.len() + report.stale_partials.len();
        if dry_run {
            println!("prune: would remove {found} paths");
            for path in report.orphaned_paths.iter().chain(&report.stale_partials) {
                println!("  {}", path.display());
            }
        } else {
            println!("prune: removed {} of {found} paths", report.removed);
        }
    }
    Ok(EXIT_SUCCESS)
}
