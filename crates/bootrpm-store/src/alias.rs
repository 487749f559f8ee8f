use crate::layout::DestinationLayout;
use crate::{fsync_dir, StoreError};
use bootrpm_schema::BuildIdentifier;
use std::fs;
use std::os::unix::fs::symlink;
use tracing::debug;

/// Repoints the `latest` alias of a destination at one build.
pub trait AliasPublish: Send + Sync {
    fn publish(&self, layout: &DestinationLayout, id: &BuildIdentifier) -> Result<(), StoreError>;
}

/// Publishes the alias as a relative symbolic link.
///
/// The new link is created under a unique hidden name and renamed over the
/// alias, so readers always resolve either the previous build or the new one.
/// The existing alias is never unlinked first.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkPublisher;

impl AliasPublish for SymlinkPublisher {
    fn publish(&self, layout: &DestinationLayout, id: &BuildIdentifier) -> Result<(), StoreError> {
        let target_name = layout.build_file_name(id);
        let target_path = layout.dir().join(&target_name);
        match fs::symlink_metadata(&target_path) {
            Ok(m) if m.is_file() => {}
            _ => return Err(StoreError::BuildNotFound(target_name)),
        }

        let tmp = tempfile::Builder::new()
            .prefix(&layout.alias_temp_prefix())
            .make_in(layout.dir(), |path| symlink(&target_name, path))?;
        tmp.persist(layout.alias_path())
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(layout.dir())?;

        debug!("alias {} -> {target_name}", layout.alias_file_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::VersionLedger;
    use bootrpm_schema::{BaseVersion, PackageName};

    fn setup() -> (tempfile::TempDir, DestinationLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = DestinationLayout::new(dir.path(), PackageName::new("pkg"), "tar");
        (dir, layout)
    }

    fn id(release: u32) -> BuildIdentifier {
        BuildIdentifier::new(BaseVersion::new("1.0").unwrap(), release).unwrap()
    }

    #[test]
    fn publish_creates_relative_link() {
        let (_dir, layout) = setup();
        fs::write(layout.build_path(&id(1)), b"one").unwrap();
        SymlinkPublisher.publish(&layout, &id(1)).unwrap();

        let target = fs::read_link(layout.alias_path()).unwrap();
        assert_eq!(target.to_str().unwrap(), "pkg-1.0-1.tar");
        assert_eq!(fs::read(layout.alias_path()).unwrap(), b"one");
    }

    #[test]
    fn publish_replaces_existing_alias() {
        let (_dir, layout) = setup();
        fs::write(layout.build_path(&id(1)), b"one").unwrap();
        fs::write(layout.build_path(&id(2)), b"two").unwrap();
        SymlinkPublisher.publish(&layout, &id(1)).unwrap();
        SymlinkPublisher.publish(&layout, &id(2)).unwrap();

        let ledger = VersionLedger::new(layout.clone());
        assert_eq!(ledger.current_alias().unwrap(), Some(id(2)));
        assert_eq!(fs::read(layout.alias_path()).unwrap(), b"two");
    }

    #[test]
    fn publish_missing_build_fails_and_keeps_alias() {
        let (_dir, layout) = setup();
        fs::write(layout.build_path(&id(1)), b"one").unwrap();
        SymlinkPublisher.publish(&layout, &id(1)).unwrap();

        let err = SymlinkPublisher.publish(&layout, &id(5)).unwrap_err();
        assert!(matches!(err, StoreError::BuildNotFound(_)));
        let ledger = VersionLedger::new(layout);
        assert_eq!(ledger.current_alias().unwrap(), Some(id(1)));
    }

    #[test]
    fn publish_leaves_no_temporary_links() {
        let (dir, layout) = setup();
        fs::write(layout.build_path(&id(1)), b"one").unwrap();
        for _ in 0..3 {
            SymlinkPublisher.publish(&layout, &id(1)).unwrap();
        }
        let hidden: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(hidden.is_empty());
    }
}
