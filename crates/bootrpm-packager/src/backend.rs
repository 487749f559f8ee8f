use crate::PackagerError;
use bootrpm_schema::{BuildIdentifier, BuildRecord, DesiredConfiguration, PayloadFile};
use std::path::Path;

/// Everything a packager needs to produce one archive.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub name: String,
    pub identifier: BuildIdentifier,
    pub summary: String,
    pub requires: Vec<String>,
    pub post_install: Option<String>,
    pub files: Vec<PayloadFile>,
    /// Compact JSON of the build record to embed.
    pub record: String,
}

impl PackageRequest {
    pub fn new(desired: &DesiredConfiguration, record: &BuildRecord) -> Result<Self, PackagerError> {
        let pkg = &desired.package;
        Ok(Self {
            name: pkg.name.to_string(),
            identifier: record.identifier.clone(),
            summary: pkg.summary.clone(),
            requires: pkg.requires.clone(),
            post_install: pkg.post_install.clone(),
            files: desired.payload_files().into_iter().cloned().collect(),
            record: serde_json::to_string(record).map_err(bootrpm_schema::RecordError::from)?,
        })
    }
}

pub trait Packager: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// File extension of produced archives, without the leading dot.
    fn extension(&self) -> &str;

    /// Write the archive for `request` to `output`, replacing its contents.
    fn package(&self, request: &PackageRequest, output: &Path) -> Result<(), PackagerError>;

    /// Read the embedded build record back from an archive.
    fn read_record(&self, archive: &Path) -> Result<BuildRecord, PackagerError>;
}

pub fn select_packager(name: &str) -> Result<Box<dyn Packager>, PackagerError> {
    match name {
        "rpmbuild" => Ok(Box::new(crate::rpmbuild::RpmbuildPackager::new())),
        "tar" => Ok(Box::new(crate::archive::TarPackager::new())),
        "mock" => Ok(Box::new(crate::mock::MockPackager::new())),
        other => Err(PackagerError::Unavailable(other.to_owned())),
    }
}
