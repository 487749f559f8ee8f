//! Destination directory storage for bootrpm builds.
//!
//! This crate owns everything persisted in a destination directory: the
//! `DestinationLayout` naming scheme for build files and the `latest` alias,
//! the `VersionLedger` that scans builds, resolves the alias and tracks release
//! high-water marks, the `AliasPublish` seam with its atomic symlink
//! implementation, and the administrative `Pruner`.

pub mod alias;
pub mod layout;
pub mod ledger;
pub mod prune;

pub use alias::{AliasPublish, SymlinkPublisher};
pub use layout::{DestinationLayout, PARTIAL_SUFFIX};
pub use ledger::{ReleaseMarks, VersionLedger};
pub use prune::{remove_stale_partials, PruneReport, Pruner};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("ledger corrupt: {0}")]
    LedgerCorrupt(String),
    #[error("build not found: {0}")]
    BuildNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_ledger_corrupt() {
        let e = StoreError::LedgerCorrupt("alias points at 'x'".to_owned());
        let msg = e.to_string();
        assert!(msg.starts_with("ledger corrupt"));
        assert!(msg.contains("'x'"));
    }

    #[test]
    fn store_error_display_build_not_found() {
        let e = StoreError::BuildNotFound("pkg-1.0-3.tar".to_owned());
        assert!(e.to_string().contains("pkg-1.0-3.tar"));
    }

    #[test]
    fn fsync_dir_on_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        fsync_dir(dir.path()).unwrap();
    }
}
