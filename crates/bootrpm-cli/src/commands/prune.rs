use super::{json_pretty, load, EXIT_SUCCESS};
use std::path::Path;

pub fn run(manifest: &Path, keep: usize, dry_run: bool, json: bool) -> Result<u8, String> {
    let (desired, reconciler) = load(manifest)?;
    let report = reconciler
        .prune(&desired, keep, dry_run)
        .map_err(|e| e.to_string())?;
    let layout = reconciler.layout_for(&desired);

    if json {
        let payload = serde_json::json!({
            "dry_run": dry_run,
            "keep": keep,
            "alias": report.alias.as_ref().map(ToString::to_string),
            "candidates": report.candidates.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "kept": report.kept.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "removed": report.removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let prefix = if dry_run { "would remove" } else { "removed" };
        let count = if dry_run {
            report.candidates.len()
        } else {
            report.removed
        };
        println!("prune: {prefix} {count} builds, kept {}", report.kept.len());
        if dry_run {
            for id in &report.candidates {
                println!("  {}", layout.build_file_name(id));
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
