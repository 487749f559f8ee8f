use crate::layout::{DestinationLayout, PARTIAL_SUFFIX};
use crate::{fsync_dir, StoreError};
use bootrpm_schema::{BaseVersion, BuildIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

const MARKS_FORMAT_VERSION: u32 = 1;

/// Highest release ever reserved per base version.
///
/// Keeps release numbers from being handed out twice after an operator
/// deletes the newest build files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMarks {
    pub format_version: u32,
    pub high_water: BTreeMap<String, u32>,
}

impl Default for ReleaseMarks {
    fn default() -> Self {
        Self {
            format_version: MARKS_FORMAT_VERSION,
            high_water: BTreeMap::new(),
        }
    }
}

impl ReleaseMarks {
    pub fn get(&self, base: &BaseVersion) -> u32 {
        self.high_water.get(base.as_str()).copied().unwrap_or(0)
    }
}

/// Read-mostly view of the builds in a destination directory.
///
/// Every query rescans the filesystem; nothing is cached between calls.
pub struct VersionLedger {
    layout: DestinationLayout,
}

impl VersionLedger {
    pub fn new(layout: DestinationLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DestinationLayout {
        &self.layout
    }

    /// All build identifiers present, ascending by `(base, release)`.
    pub fn list_builds(&self) -> Result<Vec<BuildIdentifier>, StoreError> {
        let dir = self.layout.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut builds = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(id) = self.layout.parse_build_name(name) else {
                continue;
            };
            if entry.file_type()?.is_file() {
                builds.push(id);
            } else {
                warn!("ignoring non-regular entry with a build name: {name}");
            }
        }
        builds.sort();
        debug!(
            "found {} builds of {} in {}",
            builds.len(),
            self.layout.package(),
            dir.display()
        );
        Ok(builds)
    }

    /// Resolve the `latest` alias. `None` when no alias exists yet.
    pub fn current_alias(&self) -> Result<Option<BuildIdentifier>, StoreError> {
        let alias = self.layout.alias_path();
        let meta = match fs::symlink_metadata(&alias) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !meta.file_type().is_symlink() {
            return Err(StoreError::LedgerCorrupt(format!(
                "alias {} is not a symbolic link",
                alias.display()
            )));
        }

        let target = fs::read_link(&alias)?;
        let corrupt = |why: &str| {
            StoreError::LedgerCorrupt(format!(
                "alias {} -> {}: {why}",
                alias.display(),
                target.display()
            ))
        };

        if let Some(parent) = target.parent() {
            if !self.is_destination_dir(parent) {
                return Err(corrupt("target is outside the destination directory"));
            }
        }
        let id = target
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.layout.parse_build_name(n))
            .ok_or_else(|| corrupt("target does not match the build naming scheme"))?;

        match fs::symlink_metadata(self.layout.build_path(&id)) {
            Ok(m) if m.is_file() => Ok(Some(id)),
            Ok(_) => Err(corrupt("target is not a regular build file")),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(corrupt("target build does not exist")),
            Err(e) => Err(e.into()),
        }
    }

    fn is_destination_dir(&self, parent: &Path) -> bool {
        if parent.as_os_str().is_empty() || parent == self.layout.dir() {
            return true;
        }
        // Relative link targets resolve against the directory holding the link.
        let parent = self.layout.dir().join(parent);
        match (parent.canonicalize(), self.layout.dir().canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    pub fn marks(&self) -> Result<ReleaseMarks, StoreError> {
        let path = self.layout.releases_file();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReleaseMarks::default()),
            Err(e) => return Err(e.into()),
        };
        let marks: ReleaseMarks = serde_json::from_str(&content).map_err(|e| {
            StoreError::LedgerCorrupt(format!("unreadable release marks {}: {e}", path.display()))
        })?;
        if marks.format_version != MARKS_FORMAT_VERSION {
            return Err(StoreError::LedgerCorrupt(format!(
                "release marks {} have format_version {}, expected {MARKS_FORMAT_VERSION}",
                path.display(),
                marks.format_version
            )));
        }
        Ok(marks)
    }

    /// Next unused identifier for `base`: one past the highest release either
    /// listed on disk or ever reserved, or release 1 for a fresh base.
    pub fn next_version(&self, base: &BaseVersion) -> Result<BuildIdentifier, StoreError> {
        let listed = self
            .list_builds()?
            .into_iter()
            .filter(|id| id.base == *base)
            .map(|id| id.release)
            .max()
            .unwrap_or(0);
        let reserved = self.marks()?.get(base);
        let top = listed.max(reserved);
        Ok(BuildIdentifier {
            base: base.clone(),
            release: top.saturating_add(1),
        })
    }

    /// Record `id` as handed out so it is never issued again.
    pub fn reserve(&self, id: &BuildIdentifier) -> Result<(), StoreError> {
        let mut marks = self.marks()?;
        if marks.get(&id.base) >= id.release {
            return Ok(());
        }
        marks
            .high_water
            .insert(id.base.as_str().to_owned(), id.release);

        let content = serde_json::to_string_pretty(&marks)?;
        let dir = self.layout.dir();
        let mut tmp = tempfile::Builder::new()
            .prefix(&self.layout.partial_prefix())
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.layout.releases_file())
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(dir)?;
        debug!("reserved release {id}");
        Ok(())
    }
}
