use super::{json_pretty, load, EXIT_SUCCESS};
use bootrpm_core::BuildSelector;
use std::path::Path;

pub fn run(manifest: &Path, build: &str, json: bool) -> Result<u8, String> {
    let (desired, reconciler) = load(manifest)?;
    let selector: BuildSelector = build.parse().map_err(|e: bootrpm_core::CoreError| e.to_string())?;
    let record = reconciler
        .inspect(&desired, &selector)
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        let fp = &record.fingerprint;
        println!("identifier:  {}", record.identifier);
        println!("package:     {}", fp.package);
        println!("summary:     {}", fp.summary);
        println!("packager:    {}", record.packager);
        println!("created_at:  {}", record.created_at);
        println!("requires:    {}", fp.requires.join(", "));
        println!("files:");
        for (path, file) in &fp.files {
            println!("  {:04o} {} {}", file.mode, file.digest.short(), path);
        }
        if !fp.inputs.is_empty() {
            println!("inputs:");
            for (name, value) in &fp.inputs {
                println!("  {name} = {value}");
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
