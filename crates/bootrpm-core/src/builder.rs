use crate::CoreError;
use bootrpm_packager::{PackageRequest, Packager};
use bootrpm_schema::{BuildIdentifier, BuildRecord, DesiredConfiguration};
use bootrpm_store::{fsync_dir, DestinationLayout, PARTIAL_SUFFIX};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use tracing::{debug, info};

/// Mode of published build files; they are served to clients as-is.
const BUILD_MODE: u32 = 0o644;

/// Produces one immutable build file for a given identifier.
///
/// The archive is written under a hidden temporary name in the destination
/// and only renamed to its final name once its record reads back correctly.
/// The rename never replaces an existing file.
pub struct ArtifactBuilder<'a> {
    layout: &'a DestinationLayout,
    packager: &'a dyn Packager,
}

fn failed(
    id: &BuildIdentifier,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> CoreError {
    CoreError::BuildFailed {
        id: id.clone(),
        source: source.into(),
    }
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(layout: &'a DestinationLayout, packager: &'a dyn Packager) -> Self {
        Self { layout, packager }
    }

    pub fn build(
        &self,
        desired: &DesiredConfiguration,
        id: &BuildIdentifier,
    ) -> Result<BuildIdentifier, CoreError> {
        let record = BuildRecord::new(id.clone(), desired.fingerprint(), self.packager.name());
        let request = PackageRequest::new(desired, &record).map_err(|e| failed(id, e))?;

        let tmp = tempfile::Builder::new()
            .prefix(&self.layout.partial_prefix())
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(self.layout.dir())
            .map_err(|e| failed(id, e))?;
        debug!("packaging {id} into {}", tmp.path().display());

        self.packager
            .package(&request, tmp.path())
            .map_err(|e| failed(id, e))?;

        let written = self
            .packager
            .read_record(tmp.path())
            .map_err(|e| failed(id, e))?;
        if written.identifier != record.identifier || written.fingerprint != record.fingerprint {
            return Err(failed(id, "packaged record does not match the requested build"));
        }

        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(BUILD_MODE))
            .map_err(|e| failed(id, e))?;

        let final_path = self.layout.build_path(id);
        tmp.persist_noclobber(&final_path).map_err(|e| {
            if e.error.kind() == ErrorKind::AlreadyExists {
                failed(id, "release already taken")
            } else {
                failed(id, e.error)
            }
        })?;
        fsync_dir(self.layout.dir()).map_err(|e| failed(id, e))?;

        info!("built {}", self.layout.build_file_name(id));
        Ok(id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootrpm_packager::{MockPackager, TarPackager};
    use bootrpm_schema::{BaseVersion, PackageSpec};

    fn desired(dest: &std::path::Path) -> DesiredConfiguration {
        DesiredConfiguration::new(
            PackageSpec::new("pkg", BaseVersion::new("1.0").unwrap()),
            "/usr/bin/s",
            "#!/bin/sh\n",
            dest,
        )
    }

    fn id(release: u32) -> BuildIdentifier {
        BuildIdentifier::new(BaseVersion::new("1.0").unwrap(), release).unwrap()
    }

    fn entries(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn build_writes_final_name_only() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DestinationLayout::new(dir.path(), "pkg".into(), "tar");
        let builder = ArtifactBuilder::new(&layout, &TarPackager);

        let built = builder.build(&desired(dir.path()), &id(1)).unwrap();
        assert_eq!(built, id(1));
        assert_eq!(entries(dir.path()), vec!["pkg-1.0-1.tar"]);

        let mode = fs::metadata(layout.build_path(&id(1))).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, BUILD_MODE);
        assert_eq!(
            TarPackager.read_record(&layout.build_path(&id(1))).unwrap().identifier,
            id(1)
        );
    }

    #[test]
    fn packaging_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DestinationLayout::new(dir.path(), "pkg".into(), "mock");
        let mock = MockPackager::new();
        mock.set_failing(true);
        let builder = ArtifactBuilder::new(&layout, &mock);

        let err = builder.build(&desired(dir.path()), &id(1)).unwrap_err();
        assert!(matches!(err, CoreError::BuildFailed { .. }));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn taken_release_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DestinationLayout::new(dir.path(), "pkg".into(), "tar");
        fs::write(layout.build_path(&id(1)), b"existing").unwrap();
        let builder = ArtifactBuilder::new(&layout, &TarPackager);

        let err = builder.build(&desired(dir.path()), &id(1)).unwrap_err();
        assert!(err.to_string().contains("release already taken"));
        assert_eq!(fs::read(layout.build_path(&id(1))).unwrap(), b"existing");
        assert_eq!(entries(dir.path()), vec!["pkg-1.0-1.tar"]);
    }
}
