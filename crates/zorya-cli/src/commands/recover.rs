use super::{json_pretty, open_pipeline, EXIT_SUCCESS};
use std::path::Path;

pub fn run(config: &Path, json: bool) -> Result<u8, String> {
    let pipeline = open_pipeline(config)?;
    let report = pipeline.startup_recovery();

    if json {
        let rolled_back: serde_json::Map<String, serde_json::Value> = report
            .rolled_back
            .iter()
            .map(|(stage, n)| (stage.to_string(), serde_json::json!(n)))
            .collect();
        let payload = serde_json::json!({
            "rolled_back": rolled_back,
            "total": report.total(),
            "skipped": report.skipped.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        if report.total() == 0 {
            println!("recover: nothing to roll back");
        }
        for (stage, n) in &report.rolled_back {
            println!("recover: rolled back {n} interrupted {stage} run(s)");
        }
        for stage in &report.skipped {
            println!("recover: {stage} is running, left alone");
        }
    }
    Ok(EXIT_SUCCESS)
}
