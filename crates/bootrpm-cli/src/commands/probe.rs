use super::{colorize_status, json_pretty, load, EXIT_DRIFT, EXIT_SUCCESS};
use std::path::Path;

pub fn run(manifest: &Path, json: bool) -> Result<u8, String> {
    let (desired, reconciler) = load(manifest)?;
    let report = reconciler.probe(&desired).map_err(|e| e.to_string())?;
    let layout = reconciler.layout_for(&desired);

    if json {
        let payload = serde_json::json!({
            "package": desired.package.name,
            "satisfied": report.satisfied,
            "current": report.current.as_ref().map(ToString::to_string),
            "changes": report.changes,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let status = if report.satisfied { "satisfied" } else { "drift" };
        println!("status:   {}", colorize_status(status));
        match &report.current {
            Some(id) => println!("current:  {}", layout.build_file_name(id)),
            None => println!("current:  (no published build)"),
        }
        if !report.changes.is_empty() {
            println!("changed:  {}", report.changes.join(", "));
        }
    }

    if report.satisfied {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_DRIFT)
    }
}
