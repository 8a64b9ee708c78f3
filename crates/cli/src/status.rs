//! `holdings status`: record counts per kind.

use std::path::PathBuf;

use crate::CliError;

pub fn cmd_status(db: PathBuf, json_output: bool) -> Result<(), CliError> {
    let store = crate::open_existing(&db)?;
    let counts = store
        .kind_counts()
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", db.display())))?;

    if json_output {
        let kinds: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(kind, count)| (kind.clone(), serde_json::Value::from(*count)))
            .collect();
        let json_str = serde_json::to_string_pretty(&serde_json::json!({ "kinds": kinds }))
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    if counts.is_empty() {
        println!("no records");
        return Ok(());
    }
    let width = counts.iter().map(|(kind, _)| kind.len()).max().unwrap_or(0);
    for (kind, count) in &counts {
        println!("{kind:<width$}  {count}");
    }
    Ok(())
}
