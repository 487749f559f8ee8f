//! Build identifiers, desired configuration, fingerprints, and manifest parsing for bootrpm.
//!
//! This crate defines the value layer: the ordered `BuildIdentifier` naming one
//! immutable package build, the `DesiredConfiguration` a reconciliation cycle
//! converges towards, its content `ConfigFingerprint` (embedded in every build
//! as a `BuildRecord`), and the TOML manifest that declares it.

pub mod desired;
pub mod manifest;
pub mod types;
pub mod version;

pub use desired::{
    clean_path, validate_package_name, BuildRecord, ConfigError, ConfigFingerprint,
    DesiredConfiguration, FileDigest, PackageSpec, PayloadFile, RecordError, CERTIFICATE_MODE,
    RECORD_VERSION, SCRIPT_MODE,
};
pub use manifest::{
    load_manifest, parse_manifest_file, parse_manifest_str, FileSection, ManifestError,
    ManifestV1, OutputSection, PackageSection, ResolvedManifest, KNOWN_PACKAGERS,
};
pub use types::{ContentDigest, PackageName};
pub use version::{BaseVersion, BuildIdentifier, VersionError};
