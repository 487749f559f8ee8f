use crate::types::{ContentDigest, PackageName};
use crate::version::{BaseVersion, BuildIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Current embedded record format version.
pub const RECORD_VERSION: u32 = 1;

pub const SCRIPT_MODE: u32 = 0o755;
pub const CERTIFICATE_MODE: u32 = 0o644;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid package name '{0}': must be 1-200 characters of [A-Za-z0-9._+-] and not end in '-latest'")]
    InvalidPackageName(String),
    #[error("install path must be absolute: '{0}'")]
    RelativeInstallPath(String),
    #[error("install path {0:?} must not contain control characters or '\"'")]
    InvalidInstallPath(String),
    #[error("invalid requires entry {0:?}: must not be empty or contain control characters or '\"'")]
    InvalidRequires(String),
    #[error("install path '{0}' is used by more than one payload file")]
    DuplicateInstallPath(String),
    #[error("input name must not be empty")]
    EmptyInputName,
    #[error("destination directory must not be empty")]
    EmptyDestination,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed build record: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported record_version: {0}, expected {RECORD_VERSION}")]
    UnsupportedVersion(u32),
}

/// One file shipped inside the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    pub install_path: String,
    pub mode: u32,
    pub content: Vec<u8>,
}

impl PayloadFile {
    pub fn new(install_path: impl Into<String>, mode: u32, content: impl Into<Vec<u8>>) -> Self {
        Self {
            install_path: install_path.into(),
            mode,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: PackageName,
    pub base_version: BaseVersion,
    pub summary: String,
    pub requires: Vec<String>,
    pub post_install: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, base_version: BaseVersion) -> Self {
        let name = PackageName::new(name);
        let summary = format!("{name} bootstrap package");
        Self {
            name,
            base_version,
            summary,
            requires: Vec::new(),
            post_install: None,
        }
    }
}

/// The declared state one reconciliation cycle converges towards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfiguration {
    pub package: PackageSpec,
    pub script: PayloadFile,
    pub certificate: Option<PayloadFile>,
    pub inputs: BTreeMap<String, String>,
    pub destination: PathBuf,
}

impl DesiredConfiguration {
    pub fn new(
        package: PackageSpec,
        script_install_path: impl Into<String>,
        script: impl Into<Vec<u8>>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package,
            script: PayloadFile::new(script_install_path, SCRIPT_MODE, script),
            certificate: None,
            inputs: BTreeMap::new(),
            destination: destination.into(),
        }
    }

    #[must_use]
    pub fn with_certificate(
        mut self,
        install_path: impl Into<String>,
        pem: impl Into<Vec<u8>>,
    ) -> Self {
        self.certificate = Some(PayloadFile::new(install_path, CERTIFICATE_MODE, pem));
        self
    }

    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Script first, then the certificate if any.
    pub fn payload_files(&self) -> Vec<&PayloadFile> {
        let mut files = vec![&self.script];
        if let Some(cert) = &self.certificate {
            files.push(cert);
        }
        files
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_package_name(&self.package.name)?;
        if self.destination.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDestination);
        }
        if let Some(bad) = self
            .package
            .requires
            .iter()
            .find(|r| r.trim().is_empty() || !is_plain_text(r))
        {
            return Err(ConfigError::InvalidRequires(bad.clone()));
        }
        let mut seen = BTreeSet::new();
        for file in self.payload_files() {
            if !file.install_path.starts_with('/') {
                return Err(ConfigError::RelativeInstallPath(file.install_path.clone()));
            }
            if !is_plain_text(&file.install_path) {
                return Err(ConfigError::InvalidInstallPath(file.install_path.clone()));
            }
            if !seen.insert(file.install_path.as_str()) {
                return Err(ConfigError::DuplicateInstallPath(file.install_path.clone()));
            }
        }
        if self.inputs.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyInputName);
        }
        Ok(())
    }

    /// Content summary embedded in every build and compared on each probe.
    pub fn fingerprint(&self) -> ConfigFingerprint {
        let files = self
            .payload_files()
            .into_iter()
            .map(|f| {
                (
                    f.install_path.clone(),
                    FileDigest {
                        digest: ContentDigest::of(&f.content),
                        mode: f.mode,
                    },
                )
            })
            .collect();

        ConfigFingerprint {
            package: self.package.name.clone(),
            base_version: self.package.base_version.clone(),
            summary: self.package.summary.clone(),
            requires: self.package.requires.clone(),
            post_install: self
                .package
                .post_install
                .as_deref()
                .map(|s| ContentDigest::of(s.as_bytes())),
            script_path: self.script.install_path.clone(),
            files,
            inputs: self.inputs.clone(),
            destination: clean_path(&self.destination)
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Text that ends up on a single line of generated package metadata.
fn is_plain_text(s: &str) -> bool {
    !s.chars().any(|c| c.is_control() || c == '"')
}

/// Lexically drop `.` segments and resolve `..` against earlier segments.
/// The filesystem is not consulted, so the result does not depend on
/// whether the path exists yet.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

pub fn validate_package_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name.len() <= 200
        && !name.starts_with(['.', '-'])
        && !name.ends_with("-latest")
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'+' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidPackageName(name.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub digest: ContentDigest,
    pub mode: u32,
}

/// Recoverable summary of a [`DesiredConfiguration`].
///
/// Content is represented by blake3 digests; two configurations are equal
/// exactly when their fingerprints are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFingerprint {
    pub package: PackageName,
    pub base_version: BaseVersion,
    pub summary: String,
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install: Option<ContentDigest>,
    pub script_path: String,
    pub files: BTreeMap<String, FileDigest>,
    pub inputs: BTreeMap<String, String>,
    pub destination: String,
}

impl ConfigFingerprint {
    /// Names of the fields that differ between `self` and `other`, in a stable order.
    /// An empty result means the fingerprints are equal.
    pub fn diff(&self, other: &ConfigFingerprint) -> Vec<String> {
        let mut changed = Vec::new();
        if self.package != other.package {
            changed.push("package".to_owned());
        }
        if self.base_version != other.base_version {
            changed.push("base_version".to_owned());
        }
        if self.summary != other.summary {
            changed.push("summary".to_owned());
        }
        if self.requires != other.requires {
            changed.push("requires".to_owned());
        }
        if self.post_install != other.post_install {
            changed.push("post_install".to_owned());
        }
        if self.script_path != other.script_path {
            changed.push("script_path".to_owned());
        }

        let paths: BTreeSet<&String> = self.files.keys().chain(other.files.keys()).collect();
        for path in paths {
            if self.files.get(path) != other.files.get(path) {
                if *path == self.script_path || *path == other.script_path {
                    changed.push("script".to_owned());
                } else {
                    changed.push(format!("file:{path}"));
                }
            }
        }

        let names: BTreeSet<&String> = self.inputs.keys().chain(other.inputs.keys()).collect();
        for name in names {
            if self.inputs.get(name) != other.inputs.get(name) {
                changed.push(format!("input:{name}"));
            }
        }

        if self.destination != other.destination {
            changed.push("destination".to_owned());
        }
        changed.dedup();
        changed
    }
}

/// Metadata embedded inside every build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub record_version: u32,
    pub identifier: BuildIdentifier,
    pub fingerprint: ConfigFingerprint,
    pub packager: String,
    /// Informational only; never compared.
    pub created_at: String,
}

impl BuildRecord {
    pub fn new(identifier: BuildIdentifier, fingerprint: ConfigFingerprint, packager: &str) -> Self {
        Self {
            record_version: RECORD_VERSION,
            identifier,
            fingerprint,
            packager: packager.to_owned(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, RecordError> {
        let record: BuildRecord = serde_json::from_slice(data)?;
        if record.record_version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion(record.record_version));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(script: &str, cert: &str, port: &str) -> DesiredConfiguration {
        DesiredConfiguration::new(
            PackageSpec::new("katello-ca-consumer-host", BaseVersion::new("1.0").unwrap()),
            "/usr/bin/katello-rhsm-consumer",
            script,
            "/var/www/html/pub",
        )
        .with_certificate("/etc/rhsm/ca/katello-server-ca.pem", cert)
        .with_input("port", port)
    }

    #[test]
    fn equal_configurations_have_equal_fingerprints() {
        let a = desired("S1", "C1", "443");
        let b = desired("S1", "C1", "443");
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().diff(&b.fingerprint()).is_empty());
    }

    #[test]
    fn diff_names_each_changed_field() {
        let base = desired("S1", "C1", "443").fingerprint();
        assert_eq!(
            desired("S2", "C1", "443").fingerprint().diff(&base),
            vec!["script"]
        );
        assert_eq!(
            desired("S1", "C2", "443").fingerprint().diff(&base),
            vec!["file:/etc/rhsm/ca/katello-server-ca.pem"]
        );
        assert_eq!(
            desired("S1", "C1", "8443").fingerprint().diff(&base),
            vec!["input:port"]
        );
    }

    #[test]
    fn diff_detects_added_and_removed_inputs() {
        let a = desired("S1", "C1", "443").fingerprint();
        let b = desired("S1", "C1", "443")
            .with_input("hostname", "proxy.example.com")
            .fingerprint();
        assert_eq!(a.diff(&b), vec!["input:hostname"]);
        assert_eq!(b.diff(&a), vec!["input:hostname"]);
    }

    #[test]
    fn diff_detects_destination_and_base_version() {
        let a = desired("S1", "C1", "443");
        let mut b = a.clone();
        b.destination = PathBuf::from("/srv/pub");
        b.package.base_version = BaseVersion::new("2.0").unwrap();
        assert_eq!(
            b.fingerprint().diff(&a.fingerprint()),
            vec!["base_version", "destination"]
        );
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        let mut d = desired("S1", "C1", "443");
        assert!(d.validate().is_ok());

        d.script.install_path = "usr/bin/x".to_owned();
        assert_eq!(
            d.validate(),
            Err(ConfigError::RelativeInstallPath("usr/bin/x".to_owned()))
        );

        let d = DesiredConfiguration::new(
            PackageSpec::new("pkg", BaseVersion::new("1.0").unwrap()),
            "/usr/bin/x",
            "s",
            "/tmp/out",
        )
        .with_certificate("/usr/bin/x", "c");
        assert!(matches!(
            d.validate(),
            Err(ConfigError::DuplicateInstallPath(_))
        ));
    }

    #[test]
    fn validate_rejects_multiline_requires_and_quoted_paths() {
        let mut d = desired("S1", "C1", "443");
        d.package.requires = vec!["sm\n%post\necho injected".to_owned()];
        assert!(matches!(d.validate(), Err(ConfigError::InvalidRequires(_))));

        d.package.requires = vec!["subscription-manager >= 1.28".to_owned()];
        assert!(d.validate().is_ok());
        d.package.requires.push(" ".to_owned());
        assert!(matches!(d.validate(), Err(ConfigError::InvalidRequires(_))));

        let mut d = desired("S1", "C1", "443");
        d.script.install_path = "/usr/bin/a\"b".to_owned();
        assert!(matches!(d.validate(), Err(ConfigError::InvalidInstallPath(_))));
        d.script.install_path = "/usr/bin/a\tb".to_owned();
        assert!(matches!(d.validate(), Err(ConfigError::InvalidInstallPath(_))));
    }

    #[test]
    fn clean_path_is_lexical() {
        assert_eq!(clean_path(Path::new("/srv/./pub")), PathBuf::from("/srv/pub"));
        assert_eq!(clean_path(Path::new("/srv/www/../pub/")), PathBuf::from("/srv/pub"));
        assert_eq!(clean_path(Path::new("/../pub")), PathBuf::from("/pub"));
        assert_eq!(clean_path(Path::new("./pub")), PathBuf::from("pub"));
        assert_eq!(clean_path(Path::new("../pub")), PathBuf::from("../pub"));
        assert_eq!(clean_path(Path::new(".")), PathBuf::from("."));
    }

    #[test]
    fn destination_spelling_does_not_change_fingerprint() {
        let a = desired("S1", "C1", "443");
        let mut b = a.clone();
        b.destination = PathBuf::from("/var/www/html/./pub/");
        let mut c = a.clone();
        c.destination = PathBuf::from("/var/www/html/tmp/../pub");
        assert!(a.fingerprint().diff(&b.fingerprint()).is_empty());
        assert!(a.fingerprint().diff(&c.fingerprint()).is_empty());
    }

    #[test]
    fn package_name_validation() {
        assert!(validate_package_name("katello-ca-consumer-a.example.com").is_ok());
        assert!(validate_package_name("").is_err());
        assert!(validate_package_name("pkg-latest").is_err());
        assert!(validate_package_name(".hidden").is_err());
        assert!(validate_package_name("has space").is_err());
        assert!(validate_package_name("has/slash").is_err());
    }

    #[test]
    fn record_roundtrip_and_version_check() {
        let fp = desired("S1", "C1", "443").fingerprint();
        let id = BuildIdentifier::first(BaseVersion::new("1.0").unwrap());
        let record = BuildRecord::new(id.clone(), fp.clone(), "tar");
        let json = record.to_json().unwrap();
        let back = BuildRecord::from_json(json.as_bytes()).unwrap();
        assert_eq!(back.identifier, id);
        assert_eq!(back.fingerprint, fp);

        let bumped = json.replace("\"record_version\": 1", "\"record_version\": 9");
        assert!(matches!(
            BuildRecord::from_json(bumped.as_bytes()),
            Err(RecordError::UnsupportedVersion(9))
        ));
        assert!(BuildRecord::from_json(b"not json").is_err());
    }
}
