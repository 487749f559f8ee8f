use super::{colorize_status, json_pretty, load, EXIT_STORE_ERROR, EXIT_SUCCESS};
use std::path::Path;

pub fn run(manifest: &Path, json: bool) -> Result<u8, String> {
    let (desired, reconciler) = load(manifest)?;
    let report = reconciler.verify(&desired).map_err(|e| e.to_string())?;
    let layout = reconciler.layout_for(&desired);

    if json {
        let payload = serde_json::json!({
            "alias": report.alias.as_ref().map(ToString::to_string),
            "checked": report.checked,
            "unreadable": report
                .unreadable
                .iter()
                .map(|(id, reason)| serde_json::json!({"identifier": id.to_string(), "reason": reason}))
                .collect::<Vec<_>>(),
            "orphans": report.orphans.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        match &report.alias {
            Some(id) => println!(
                "alias: {} -> {}",
                layout.alias_file_name(),
                layout.build_file_name(id)
            ),
            None => println!("alias: {} (not published)", layout.alias_file_name()),
        }
        println!(
            "builds: {}/{} readable",
            report.checked - report.unreadable.len(),
            report.checked
        );
        for (id, reason) in &report.unreadable {
            println!(
                "  {} {}: {reason}",
                colorize_status("unreadable"),
                layout.build_file_name(id)
            );
        }
        for id in &report.orphans {
            println!("  {} {}", colorize_status("orphan"), layout.build_file_name(id));
        }
    }

    if report.is_ok() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_STORE_ERROR)
    }
}
