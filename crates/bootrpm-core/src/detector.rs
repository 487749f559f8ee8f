use crate::CoreError;
use bootrpm_packager::Packager;
use bootrpm_schema::{BuildIdentifier, BuildRecord, DesiredConfiguration};
use bootrpm_store::VersionLedger;
use serde::Serialize;
use tracing::debug;

/// Comparison of a desired configuration against the published alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    /// Build the alias currently points at, if any.
    pub current: Option<BuildIdentifier>,
    /// Fields whose recorded value differs from the desired one.
    pub changes: Vec<String>,
}

impl Drift {
    /// The aliased build, when it already matches.
    pub fn satisfied_by(&self) -> Option<&BuildIdentifier> {
        self.current.as_ref().filter(|_| self.changes.is_empty())
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied_by().is_some()
    }
}

/// Decides whether the aliased build was produced from a given configuration.
///
/// Only recorded content is compared. Timestamps, build counts and file
/// metadata of the archive play no part.
pub struct ChangeDetector<'a> {
    ledger: &'a VersionLedger,
    packager: &'a dyn Packager,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(ledger: &'a VersionLedger, packager: &'a dyn Packager) -> Self {
        Self { ledger, packager }
    }

    /// Record embedded in the aliased build, if there is an alias.
    pub fn aliased_record(&self) -> Result<Option<BuildRecord>, CoreError> {
        let Some(current) = self.ledger.current_alias()? else {
            return Ok(None);
        };
        let layout = self.ledger.layout();
        let record = self
            .packager
            .read_record(&layout.build_path(&current))
            .map_err(|e| {
                CoreError::LedgerCorrupt(format!(
                    "cannot read build record of {}: {e}",
                    layout.build_file_name(&current)
                ))
            })?;
        if record.identifier != current {
            return Err(CoreError::LedgerCorrupt(format!(
                "{} records identifier {}",
                layout.build_file_name(&current),
                record.identifier
            )));
        }
        Ok(Some(record))
    }

    pub fn check(&self, desired: &DesiredConfiguration) -> Result<Drift, CoreError> {
        let Some(record) = self.aliased_record()? else {
            debug!("no alias published for {}", desired.package.name);
            return Ok(Drift {
                current: None,
                changes: Vec::new(),
            });
        };
        let changes = record.fingerprint.diff(&desired.fingerprint());
        debug!(
            "alias at {}: {} changed field(s)",
            record.identifier,
            changes.len()
        );
        Ok(Drift {
            current: Some(record.identifier),
            changes,
        })
    }

    pub fn is_satisfied(&self, desired: &DesiredConfiguration) -> Result<bool, CoreError> {
        Ok(self.check(desired)?.is_satisfied())
    }
}
