use super::{colorize_status, json_pretty, open_records, EXIT_SUCCESS};
use std::path::Path;
use zorya_core::CoreError;
use zorya_store::StoreError;

pub fn run(config: &Path, id: &str, json: bool) -> Result<u8, String> {
    let records = open_records(config)?;
    let bag = match records.get(id) {
        Ok(bag) => bag,
        Err(StoreError::RecordNotFound(_) | StoreError::InvalidIdentifier(_)) => {
            return Err(format!("no bag with identifier '{id}'"));
        }
        Err(e) => return Err(CoreError::from(e).to_string()),
    };

    if json {
        println!("{}", json_pretty(&bag)?);
    } else {
        let or_none = |v: Option<String>| v.unwrap_or_else(|| "(none)".to_owned());
        println!("identifier:     {}", bag.identifier);
        println!("original_name:  {}", bag.original_name);
        println!("status:         {}", colorize_status(bag.status));
        println!(
            "local_path:     {}",
            or_none(bag.local_path.as_ref().map(|p| p.display().to_string()))
        );
        println!("origin:         {}", or_none(bag.origin.as_ref().map(ToString::to_string)));
        println!("rights_ids:     {}", bag.rights_reference.join(" "));
        println!(
            "date_range:     {}",
            or_none(bag.date_range.map(|r| match r.start {
                Some(start) => format!("{start} .. {}", r.end),
                None => format!(".. {}", r.end),
            }))
        );
        println!("profile:        {}", or_none(bag.profile_identifier.clone()));
        println!(
            "rights:         {}",
            if bag.rights_payload.is_some() { "assigned" } else { "(none)" }
        );
        println!("created_at:     {}", bag.created_at);
        println!("updated_at:     {}", bag.updated_at);
    }
    Ok(EXIT_SUCCESS)
}
