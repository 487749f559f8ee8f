pub mod apply;
pub mod completions;
pub mod inspect;
pub mod list;
pub mod man_pages;
pub mod probe;
pub mod prune;
pub mod verify;

use bootrpm_core::Reconciler;
use bootrpm_packager::select_packager;
use bootrpm_schema::{load_manifest, DesiredConfiguration};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_DRIFT: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Load the manifest and set up a reconciler for its packager.
pub fn load(manifest: &Path) -> Result<(DesiredConfiguration, Reconciler), String> {
    let resolved = load_manifest(manifest).map_err(|e| e.to_string())?;
    let packager = select_packager(&resolved.packager).map_err(|e| e.to_string())?;
    tracing::debug!(
        "manifest {} -> {} via {}",
        manifest.display(),
        resolved.desired.destination.display(),
        packager.name()
    );
    Ok((resolved.desired, Reconciler::new(packager)))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(finish_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(finish_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "latest" | "satisfied" | "ok" => Style::new().green().apply_to(status).to_string(),
        "built" => Style::new().cyan().bold().apply_to(status).to_string(),
        "drift" | "orphan" => Style::new().yellow().apply_to(status).to_string(),
        "unreadable" => Style::new().red().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_status_keeps_text() {
        for status in ["latest", "built", "drift", "orphan", "unreadable"] {
            assert!(colorize_status(status).contains(status));
        }
        assert_eq!(colorize_status("unknown"), "unknown");
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_MANIFEST_ERROR,
            EXIT_STORE_ERROR,
            EXIT_DRIFT,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn load_reports_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("bootrpm.toml")).err().unwrap();
        assert!(err.starts_with("failed to read manifest"));
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
