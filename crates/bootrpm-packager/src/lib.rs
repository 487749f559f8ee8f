//! Packaging capability for bootrpm.
//!
//! A `Packager` turns a `PackageRequest` (payload files, naming metadata and
//! the serialized build record) into one archive file, and can read the
//! record back from an archive it produced. Backends: `rpmbuild` (real RPMs),
//! `tar` (deterministic archives, no external tools) and `mock` (test double
//! with build counting and failure injection).

pub mod archive;
pub mod backend;
pub mod mock;
pub mod prereq;
pub mod rpmbuild;

pub use archive::TarPackager;
pub use backend::{select_packager, PackageRequest, Packager};
pub use mock::MockPackager;
pub use prereq::{check_prereqs, format_missing, MissingPrereq};
pub use rpmbuild::RpmbuildPackager;

use bootrpm_schema::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackagerError {
    #[error("packager I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packager '{0}' is not available on this system")]
    Unavailable(String),
    #[error("packaging failed: {0}")]
    Failed(String),
    #[error("no build record found in '{0}'")]
    RecordMissing(String),
    #[error(transparent)]
    Record(#[from] RecordError),
}
