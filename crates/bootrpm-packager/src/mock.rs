use crate::backend::{PackageRequest, Packager};
use crate::PackagerError;
use bootrpm_schema::{BuildRecord, ContentDigest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    builds: AtomicUsize,
    fail: AtomicBool,
}

/// In-process packager for tests.
///
/// Clones share state, so a test can keep a handle while the reconciler owns
/// another one. When failing, it leaves half-written output behind before
/// returning the error, like a packaging tool dying mid-write.
#[derive(Debug, Default, Clone)]
pub struct MockPackager {
    state: Arc<MockState>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MockArtifact {
    record: String,
    files: BTreeMap<String, String>,
}

impl MockPackager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `package` calls.
    pub fn build_count(&self) -> usize {
        self.state.builds.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }
}

impl Packager for MockPackager {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn extension(&self) -> &'static str {
        "mock"
    }

    fn package(&self, request: &PackageRequest, output: &Path) -> Result<(), PackagerError> {
        if self.state.fail.load(Ordering::SeqCst) {
            fs::write(output, b"{\"record\":")?;
            return Err(PackagerError::Failed(format!(
                "mock failure for {}-{}",
                request.name, request.identifier
            )));
        }

        let artifact = MockArtifact {
            record: request.record.clone(),
            files: request
                .files
                .iter()
                .map(|f| {
                    (
                        f.install_path.clone(),
                        ContentDigest::of(&f.content).into_inner(),
                    )
                })
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| PackagerError::Failed(format!("mock serialization: {e}")))?;
        fs::write(output, data)?;
        self.state.builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_record(&self, archive: &Path) -> Result<BuildRecord, PackagerError> {
        let data = fs::read(archive)?;
        let artifact: MockArtifact = serde_json::from_slice(&data).map_err(|_| {
            PackagerError::RecordMissing(archive.to_string_lossy().into_owned())
        })?;
        Ok(BuildRecord::from_json(artifact.record.as_bytes())?)
    }
}
