use super::{json_pretty, open_pipeline, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use std::path::Path;
use zorya_core::StageOutcome;
use zorya_schema::Stage;

pub fn run(config: &Path, stage: Stage, json: bool) -> Result<u8, String> {
    let pipeline = open_pipeline(config)?;

    let pb = (!json).then(|| spinner(&format!("running {stage}...")));
    let result = pipeline.run_stage(stage);

    match result {
        Ok(outcome) => {
            let (detail, objects) = outcome.report(stage);
            if json {
                let payload = serde_json::json!({
                    "stage": stage.as_str(),
                    "detail": detail,
                    "objects": objects,
                    "count": objects.len(),
                });
                println!("{}", json_pretty(&payload)?);
            } else if let Some(pb) = &pb {
                match outcome {
                    StageOutcome::Completed(id) => spin_ok(pb, &format!("{detail} {id}")),
                    StageOutcome::Idle | StageOutcome::Busy => spin_ok(pb, detail),
                }
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, &format!("{stage} failed"));
            }
            if json {
                let payload = serde_json::json!({
                    "stage": stage.as_str(),
                    "detail": e.to_string(),
                });
                println!("{}", json_pretty(&payload)?);
                eprintln!("error: {e}");
                return Ok(EXIT_FAILURE);
            }
            Err(e.to_string())
        }
    }
}
