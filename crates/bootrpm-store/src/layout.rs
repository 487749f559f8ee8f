use crate::StoreError;
use bootrpm_schema::{BuildIdentifier, PackageName};
use std::fs;
use std::path::{Path, PathBuf};

const ALIAS_TAG: &str = "latest";
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Naming scheme and paths for one package inside a destination directory.
///
/// Build files are `<package>-<base>-<release>.<ext>`, the alias is
/// `<package>-latest.<ext>`. Bookkeeping files are hidden (leading `.`) so
/// directory scans and web listings skip them.
#[derive(Debug, Clone)]
pub struct DestinationLayout {
    dir: PathBuf,
    package: PackageName,
    extension: String,
}

impl DestinationLayout {
    pub fn new(dir: impl Into<PathBuf>, package: PackageName, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package,
            extension: extension.into(),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn package(&self) -> &PackageName {
        &self.package
    }

    #[inline]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn build_file_name(&self, id: &BuildIdentifier) -> String {
        format!("{}-{}.{}", self.package, id, self.extension)
    }

    #[inline]
    pub fn build_path(&self, id: &BuildIdentifier) -> PathBuf {
        self.dir.join(self.build_file_name(id))
    }

    pub fn alias_file_name(&self) -> String {
        format!("{}-{ALIAS_TAG}.{}", self.package, self.extension)
    }

    #[inline]
    pub fn alias_path(&self) -> PathBuf {
        self.dir.join(self.alias_file_name())
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(format!(".{}.lock", self.package))
    }

    /// Per-base release high-water marks.
    #[inline]
    pub fn releases_file(&self) -> PathBuf {
        self.dir.join(format!(".{}.releases", self.package))
    }

    /// Prefix of in-flight build files; always followed by a random part and [`PARTIAL_SUFFIX`].
    ///
    /// `~` never occurs in package names, so the prefix cannot match another
    /// package sharing the directory.
    pub fn partial_prefix(&self) -> String {
        format!(".{}~", self.package)
    }

    /// Prefix of the temporary link created while publishing the alias.
    pub fn alias_temp_prefix(&self) -> String {
        format!(".{}~alias-", self.package)
    }

    pub fn is_partial_name(&self, name: &str) -> bool {
        name.starts_with(&self.partial_prefix()) && name.ends_with(PARTIAL_SUFFIX)
    }

    /// Map a file name back to its identifier. `None` for anything that is
    /// not a build file of this package (the alias included).
    pub fn parse_build_name(&self, name: &str) -> Option<BuildIdentifier> {
        let rest = name.strip_prefix(self.package.as_str())?.strip_prefix('-')?;
        let middle = rest.strip_suffix(self.extension.as_str())?.strip_suffix('.')?;
        middle.parse().ok()
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}
