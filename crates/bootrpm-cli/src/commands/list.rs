use super::{colorize_status, json_pretty, load, EXIT_SUCCESS};
use std::path::Path;

pub fn run(manifest: &Path, json: bool) -> Result<u8, String> {
    let (desired, reconciler) = load(manifest)?;
    let listing = reconciler.list(&desired).map_err(|e| e.to_string())?;
    let layout = reconciler.layout_for(&desired);

    if json {
        let builds: Vec<_> = listing
            .builds
            .iter()
            .map(|id| {
                serde_json::json!({
                    "identifier": id.to_string(),
                    "file": layout.build_file_name(id),
                    "latest": listing.alias.as_ref() == Some(id),
                })
            })
            .collect();
        println!("{}", json_pretty(&builds)?);
    } else if listing.builds.is_empty() {
        println!("no builds found in {}", layout.dir().display());
    } else {
        println!("{:<12} {:<8} FILE", "VERSION", "ALIAS");
        for id in &listing.builds {
            let marker = if listing.alias.as_ref() == Some(id) {
                colorize_status("latest")
            } else {
                String::new()
            };
            println!("{:<12} {:<8} {}", id.to_string(), marker, layout.build_file_name(id));
        }
    }
    Ok(EXIT_SUCCESS)
}
