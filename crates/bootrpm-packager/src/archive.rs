use crate::backend::{PackageRequest, Packager};
use crate::PackagerError;
use bootrpm_schema::BuildRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Archive path of the embedded build record.
pub const RECORD_ENTRY: &str = ".bootrpm/record.json";

/// Produces plain tar archives without any external tooling.
///
/// Output is deterministic for a given request: entries are sorted, mtimes
/// are zero and ownership is root.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarPackager;

impl TarPackager {
    pub fn new() -> Self {
        Self
    }
}

fn entry_header(mode: u32, size: usize) -> ::tar::Header {
    let mut header = ::tar::Header::new_gnu();
    header.set_entry_type(::tar::EntryType::Regular);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode);
    header.set_size(size as u64);
    header.set_cksum();
    header
}

impl Packager for TarPackager {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn available(&self) -> bool {
        true
    }

    fn extension(&self) -> &'static str {
        "tar"
    }

    fn package(&self, request: &PackageRequest, output: &Path) -> Result<(), PackagerError> {
        let mut files: Vec<_> = request.files.iter().collect();
        files.sort_by(|a, b| a.install_path.cmp(&b.install_path));

        let mut ar = ::tar::Builder::new(File::create(output)?);
        let record = request.record.as_bytes();
        let mut header = entry_header(0o644, record.len());
        ar.append_data(&mut header, RECORD_ENTRY, record)?;

        for file in files {
            let rel = file.install_path.trim_start_matches('/');
            let mut header = entry_header(file.mode, file.content.len());
            ar.append_data(&mut header, rel, file.content.as_slice())?;
        }

        let out = ar.into_inner()?;
        out.sync_all()?;
        debug!(
            "packed {} files for {}-{}",
            request.files.len(),
            request.name,
            request.identifier
        );
        Ok(())
    }

    fn read_record(&self, archive: &Path) -> Result<BuildRecord, PackagerError> {
        let mut ar = ::tar::Archive::new(File::open(archive)?);
        for entry in ar.entries()? {
            let mut entry = entry?;
            if entry.path()?.as_os_str() != RECORD_ENTRY {
                continue;
            }
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            return Ok(BuildRecord::from_json(&data)?);
        }
        Err(PackagerError::RecordMissing(
            archive.to_string_lossy().into_owned(),
        ))
    }
}
