use super::{colorize_status, json_pretty, open_records, EXIT_SUCCESS};
use std::path::Path;
use zorya_core::CoreError;
use zorya_schema::BagStatus;

pub fn run(config: &Path, status: Option<BagStatus>, json: bool) -> Result<u8, String> {
    let records = open_records(config)?;
    let bags = match status {
        Some(s) => records.find_by_status(s),
        None => records.list(),
    }
    .map_err(|e| CoreError::from(e).to_string())?;

    if json {
        println!("{}", json_pretty(&bags)?);
    } else if bags.is_empty() {
        println!("no bags found");
    } else {
        println!("{:<38} {:<18} ORIGINAL_NAME", "IDENTIFIER", "STATUS");
        for bag in &bags {
            println!(
                "{:<38} {:<18} {}",
                bag.identifier,
                colorize_status(bag.status),
                bag.original_name
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
