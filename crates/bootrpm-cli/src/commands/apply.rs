use super::{colorize_status, json_pretty, load, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use bootrpm_packager::{check_prereqs, format_missing};
use std::path::Path;

pub fn run(manifest: &Path, json: bool) -> Result<u8, String> {
    let (desired, reconciler) = load(manifest)?;

    if std::env::var("BOOTRPM_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = check_prereqs(reconciler.packager().name());
        if !missing.is_empty() {
            eprintln!("error: {}", format_missing(&missing));
            return Ok(EXIT_FAILURE);
        }
    }

    let pb = if json {
        None
    } else {
        Some(spinner(&format!("reconciling {}...", desired.package.name)))
    };

    let outcome = match reconciler.apply(&desired) {
        Ok(o) => {
            if let Some(ref pb) = pb {
                let msg = if o.built {
                    format!("published release {}", o.identifier)
                } else {
                    format!("release {} is up to date", o.identifier)
                };
                spin_ok(pb, &msg);
            }
            o
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "apply failed");
            }
            return Err(e.to_string());
        }
    };

    let layout = reconciler.layout_for(&desired);
    if json {
        let payload = serde_json::json!({
            "package": desired.package.name,
            "identifier": outcome.identifier.to_string(),
            "file": layout.build_file_name(&outcome.identifier),
            "alias": layout.alias_file_name(),
            "built": outcome.built,
            "previous": outcome.previous.as_ref().map(ToString::to_string),
            "changes": outcome.changes,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let status = if outcome.built { "built" } else { "satisfied" };
        println!(
            "{} {} -> {}",
            colorize_status(status),
            layout.alias_file_name(),
            layout.build_file_name(&outcome.identifier)
        );
        if let Some(prev) = &outcome.previous {
            if outcome.built {
                println!("previous: {}", layout.build_file_name(prev));
            }
        }
        if !outcome.changes.is_empty() {
            println!("changed:  {}", outcome.changes.join(", "));
        }
    }
    Ok(EXIT_SUCCESS)
}
