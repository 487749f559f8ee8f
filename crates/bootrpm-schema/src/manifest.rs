use crate::desired::{clean_path, ConfigError, DesiredConfiguration, PackageSpec};
use crate::version::{BaseVersion, VersionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("manifest error: {0}")]
    Version(#[from] VersionError),
    #[error("manifest error: {0}")]
    Config(#[from] ConfigError),
    #[error("manifest error: failed to read {what} source '{path}': {source}")]
    ReadSource {
        what: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[error("manifest error: cannot resolve destination '{path}' against the current directory: {source}")]
    Destination {
        path: String,
        source: std::io::Error,
    },
    #[error("manifest error: unknown packager '{0}', expected one of: rpmbuild, tar, mock")]
    UnknownPackager(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestV1 {
    pub manifest_version: u32,
    pub package: PackageSection,
    pub script: FileSection,
    #[serde(default)]
    pub certificate: Option<FileSection>,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    #[serde(default = "default_base_version")]
    pub base_version: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub post_install: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileSection {
    /// Path of the file to package, relative to the manifest directory.
    pub source: String,
    pub install_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub destination: String,
    #[serde(default = "default_packager")]
    pub packager: String,
}

fn default_base_version() -> String {
    "1.0".to_owned()
}

fn default_packager() -> String {
    "rpmbuild".to_owned()
}

pub const KNOWN_PACKAGERS: &[&str] = &["rpmbuild", "tar", "mock"];

/// A manifest with every source file read and every field validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub desired: DesiredConfiguration,
    pub packager: String,
}

impl ManifestV1 {
    /// Validate the manifest and read its source files relative to `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> Result<ResolvedManifest, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }

        let packager = self.output.packager.trim().to_lowercase();
        if !KNOWN_PACKAGERS.contains(&packager.as_str()) {
            return Err(ManifestError::UnknownPackager(packager));
        }

        let base_version = BaseVersion::new(self.package.base_version.trim())?;
        let mut package = PackageSpec::new(self.package.name.trim(), base_version);
        if let Some(summary) = &self.package.summary {
            let summary = summary.trim();
            if !summary.is_empty() {
                summary.clone_into(&mut package.summary);
            }
        }
        package.requires = normalize_string_list(&self.package.requires);
        package.post_install = self
            .package
            .post_install
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .cloned();

        let script = read_source("script", base_dir, &self.script.source)?;
        let destination = resolve_destination(base_dir, self.output.destination.trim())?;

        let mut desired = DesiredConfiguration::new(
            package,
            self.script.install_path.trim(),
            script,
            destination,
        );
        if let Some(cert) = &self.certificate {
            let pem = read_source("certificate", base_dir, &cert.source)?;
            desired = desired.with_certificate(cert.install_path.trim(), pem);
        }
        for (name, value) in &self.inputs {
            desired = desired.with_input(name.trim(), value.trim());
        }

        desired.validate()?;
        Ok(ResolvedManifest { desired, packager })
    }
}

fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Absolute, lexically cleaned destination, so every spelling of the
/// manifest path yields the same directory and the same fingerprint.
fn resolve_destination(base_dir: &Path, raw: &str) -> Result<PathBuf, ManifestError> {
    let path = resolve_path(base_dir, raw);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|source| ManifestError::Destination {
                path: path.to_string_lossy().into_owned(),
                source,
            })?
            .join(path)
    };
    Ok(clean_path(&absolute))
}

fn read_source(what: &'static str, base_dir: &Path, raw: &str) -> Result<Vec<u8>, ManifestError> {
    let path = resolve_path(base_dir, raw.trim());
    fs::read(&path).map_err(|source| ManifestError::ReadSource {
        what,
        path: path.to_string_lossy().into_owned(),
        source,
    })
}

fn normalize_string_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

/// Parse and resolve a manifest file; sources resolve against its directory.
pub fn load_manifest(path: &Path) -> Result<ResolvedManifest, ManifestError> {
    let manifest = parse_manifest_file(path)?;
    let base_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // The manifest was just read, so its directory exists.
    let base_dir = fs::canonicalize(&base_dir)?;
    manifest.resolve(&base_dir)
}
