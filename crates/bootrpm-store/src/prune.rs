use crate::layout::DestinationLayout;
use crate::ledger::VersionLedger;
use crate::StoreError;
use bootrpm_schema::BuildIdentifier;
use serde::Serialize;
use std::fs;
use tracing::{debug, info, warn};

/// Administrative removal of old builds.
///
/// Reconciliation never deletes builds; this is only reached from an explicit
/// operator command. Release high-water marks are left untouched, so pruned
/// release numbers are never reissued.
pub struct Pruner {
    layout: DestinationLayout,
}

#[derive(Debug, Default, Serialize)]
pub struct PruneReport {
    pub alias: Option<BuildIdentifier>,
    pub kept: Vec<BuildIdentifier>,
    pub candidates: Vec<BuildIdentifier>,
    pub removed: usize,
}

impl Pruner {
    pub fn new(layout: DestinationLayout) -> Self {
        Self { layout }
    }

    /// Keep the newest `keep` builds plus the alias target; remove the rest
    /// unless `dry_run`. Refuses to run while the alias is corrupt.
    pub fn collect(&self, keep: usize, dry_run: bool) -> Result<PruneReport, StoreError> {
        let ledger = VersionLedger::new(self.layout.clone());
        let alias = ledger.current_alias()?;
        let builds = ledger.list_builds()?;

        let mut report = PruneReport {
            alias: alias.clone(),
            ..PruneReport::default()
        };

        let newest_start = builds.len().saturating_sub(keep);
        for (idx, id) in builds.into_iter().enumerate() {
            if idx >= newest_start || alias.as_ref() == Some(&id) {
                report.kept.push(id);
            } else {
                report.candidates.push(id);
            }
        }

        if !dry_run {
            for id in &report.candidates {
                let path = self.layout.build_path(id);
                fs::remove_file(&path)?;
                debug!("pruned {}", path.display());
                report.removed += 1;
            }
            info!(
                "pruned {} builds of {}, kept {}",
                report.removed,
                self.layout.package(),
                report.kept.len()
            );
        }

        Ok(report)
    }
}

/// Remove in-flight files left behind by cycles that died mid-build.
///
/// Only safe while holding the destination lock: without it a concurrent
/// cycle's temporary file could be removed from under it.
pub fn remove_stale_partials(layout: &DestinationLayout) -> Result<Vec<String>, StoreError> {
    let dir = layout.dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let alias_temp = layout.alias_temp_prefix();
    let mut removed = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(layout.is_partial_name(name) || name.starts_with(&alias_temp)) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("removed stale temporary file {name}");
                removed.push(name.to_owned());
            }
            Err(e) => warn!("failed to remove stale temporary file {name}: {e}"),
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::{AliasPublish, SymlinkPublisher};
    use bootrpm_schema::{BaseVersion, PackageName};

    fn setup(releases: u32) -> (tempfile::TempDir, DestinationLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = DestinationLayout::new(dir.path(), PackageName::new("pkg"), "tar");
        for r in 1..=releases {
            fs::write(layout.build_path(&id(r)), format!("build {r}")).unwrap();
        }
        (dir, layout)
    }

    fn id(release: u32) -> BuildIdentifier {
        BuildIdentifier::new(BaseVersion::new("1.0").unwrap(), release).unwrap()
    }

    #[test]
    fn dry_run_reports_without_removing() {
        let (_dir, layout) = setup(5);
        SymlinkPublisher.publish(&layout, &id(5)).unwrap();
        let report = Pruner::new(layout.clone()).collect(2, true).unwrap();
        assert_eq!(report.candidates, vec![id(1), id(2), id(3)]);
        assert_eq!(report.kept, vec![id(4), id(5)]);
        assert_eq!(report.removed, 0);
        assert!(layout.build_path(&id(1)).exists());
    }

    #[test]
    fn prune_never_removes_alias_target() {
        let (_dir, layout) = setup(5);
        SymlinkPublisher.publish(&layout, &id(2)).unwrap();
        let report = Pruner::new(layout.clone()).collect(1, false).unwrap();
        assert_eq!(report.kept, vec![id(2), id(5)]);
        assert_eq!(report.removed, 3);
        assert!(layout.build_path(&id(2)).exists());
        assert!(!layout.build_path(&id(3)).exists());

        let ledger = VersionLedger::new(layout);
        assert_eq!(ledger.current_alias().unwrap(), Some(id(2)));
    }

    #[test]
    fn prune_keep_zero_still_keeps_alias() {
        let (_dir, layout) = setup(3);
        SymlinkPublisher.publish(&layout, &id(3)).unwrap();
        let report = Pruner::new(layout).collect(0, false).unwrap();
        assert_eq!(report.kept, vec![id(3)]);
        assert_eq!(report.removed, 2);
    }

    #[test]
    fn prune_refuses_corrupt_alias() {
        let (_dir, layout) = setup(2);
        fs::write(layout.alias_path(), b"plain file").unwrap();
        assert!(matches!(
            Pruner::new(layout).collect(0, false),
            Err(StoreError::LedgerCorrupt(_))
        ));
    }

    #[test]
    fn stale_partials_are_removed_and_others_kept() {
        let (dir, layout) = setup(1);
        let partial = format!("{}abc{}", layout.partial_prefix(), crate::layout::PARTIAL_SUFFIX);
        let alias_tmp = format!("{}xyz", layout.alias_temp_prefix());
        fs::write(dir.path().join(&partial), b"half").unwrap();
        std::os::unix::fs::symlink("pkg-1.0-1.tar", dir.path().join(&alias_tmp)).unwrap();
        fs::write(dir.path().join(".other~abc.partial"), b"not ours").unwrap();

        let mut expected = vec![partial, alias_tmp];
        expected.sort();
        assert_eq!(remove_stale_partials(&layout).unwrap(), expected);
        assert!(dir.path().join(".other~abc.partial").exists());
        assert!(layout.build_path(&id(1)).exists());
    }
}
