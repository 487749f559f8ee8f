use crate::builder::ArtifactBuilder;
use crate::concurrency::DestinationLock;
use crate::detector::ChangeDetector;
use crate::lifecycle::{validate_transition, ReconcileState};
use crate::CoreError;
use bootrpm_packager::Packager;
use bootrpm_schema::{BuildIdentifier, BuildRecord, DesiredConfiguration};
use bootrpm_store::{
    remove_stale_partials, AliasPublish, DestinationLayout, PruneReport, Pruner, StoreError,
    SymlinkPublisher, VersionLedger,
};
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Drives reconciliation cycles for one packaging backend.
///
/// Holds no state between cycles: everything is read back from the
/// destination directory each time, so a cycle interrupted at any point is
/// picked up by the next one.
pub struct Reconciler {
    packager: Box<dyn Packager>,
    publisher: Box<dyn AliasPublish>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub satisfied: bool,
    pub current: Option<BuildIdentifier>,
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// The published build after the cycle.
    pub identifier: BuildIdentifier,
    /// Whether this cycle produced a new build.
    pub built: bool,
    pub previous: Option<BuildIdentifier>,
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildListing {
    pub alias: Option<BuildIdentifier>,
    pub builds: Vec<BuildIdentifier>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub alias: Option<BuildIdentifier>,
    pub checked: usize,
    /// Builds whose record could not be read, with the reason.
    pub unreadable: Vec<(BuildIdentifier, String)>,
    /// Builds ordered after the alias target; left by failed publishes.
    pub orphans: Vec<BuildIdentifier>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.unreadable.is_empty()
    }
}

/// Which build an operator command refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSelector {
    Latest,
    /// A release of the configured base version.
    Release(u32),
    Exact(BuildIdentifier),
}

impl FromStr for BuildSelector {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "latest" {
            return Ok(BuildSelector::Latest);
        }
        if let Ok(release) = s.parse::<u32>() {
            if release > 0 {
                return Ok(BuildSelector::Release(release));
            }
        }
        s.parse::<BuildIdentifier>()
            .map(BuildSelector::Exact)
            .map_err(|_| CoreError::InvalidSelector(s.to_owned()))
    }
}

fn advance(state: &mut ReconcileState, to: ReconcileState) -> Result<(), CoreError> {
    validate_transition(*state, to)?;
    debug!("reconcile: {state} -> {to}");
    *state = to;
    Ok(())
}

impl Reconciler {
    pub fn new(packager: Box<dyn Packager>) -> Self {
        Self::with_publisher(packager, Box::new(SymlinkPublisher))
    }

    pub fn with_publisher(packager: Box<dyn Packager>, publisher: Box<dyn AliasPublish>) -> Self {
        Self {
            packager,
            publisher,
        }
    }

    pub fn packager(&self) -> &dyn Packager {
        self.packager.as_ref()
    }

    pub fn layout_for(&self, desired: &DesiredConfiguration) -> DestinationLayout {
        DestinationLayout::new(
            desired.destination.clone(),
            desired.package.name.clone(),
            self.packager.extension(),
        )
    }

    fn ledger_for(&self, desired: &DesiredConfiguration) -> VersionLedger {
        VersionLedger::new(self.layout_for(desired))
    }

    /// Read-only check of the destination against `desired`.
    pub fn probe(&self, desired: &DesiredConfiguration) -> Result<ProbeReport, CoreError> {
        desired.validate()?;
        let ledger = self.ledger_for(desired);
        let drift = ChangeDetector::new(&ledger, self.packager()).check(desired)?;
        Ok(ProbeReport {
            satisfied: drift.is_satisfied(),
            current: drift.current,
            changes: drift.changes,
        })
    }

    /// Converge the destination towards `desired`.
    ///
    /// Builds and publishes the next release unless the alias already
    /// matches. A publish failure leaves the new build on disk as an orphan;
    /// the next cycle allocates a fresh release instead of reusing it.
    pub fn apply(&self, desired: &DesiredConfiguration) -> Result<ApplyOutcome, CoreError> {
        desired.validate()?;
        let layout = self.layout_for(desired);
        let ledger = VersionLedger::new(layout.clone());
        let mut state = ReconcileState::Idle;

        layout.initialize()?;
        let _lock = DestinationLock::acquire(&layout.lock_file())?;
        let swept = remove_stale_partials(&layout)?;
        if !swept.is_empty() {
            warn!("removed {} stale temporary file(s) from an interrupted cycle", swept.len());
        }

        advance(&mut state, ReconcileState::Checking)?;
        let drift = ChangeDetector::new(&ledger, self.packager()).check(desired)?;
        if let Some(current) = drift.satisfied_by() {
            advance(&mut state, ReconcileState::Satisfied)?;
            info!("{} is up to date", layout.build_file_name(current));
            return Ok(ApplyOutcome {
                identifier: current.clone(),
                built: false,
                previous: drift.current.clone(),
                changes: Vec::new(),
            });
        }

        advance(&mut state, ReconcileState::Building)?;
        if !drift.changes.is_empty() {
            info!("configuration changed: {}", drift.changes.join(", "));
        }
        let id = ledger.next_version(&desired.package.base_version)?;
        ledger.reserve(&id).map_err(|e| match e {
            StoreError::LedgerCorrupt(msg) => CoreError::LedgerCorrupt(msg),
            other => CoreError::BuildFailed {
                id: id.clone(),
                source: Box::new(other),
            },
        })?;
        ArtifactBuilder::new(&layout, self.packager()).build(desired, &id)?;

        advance(&mut state, ReconcileState::Publishing)?;
        self.publisher
            .publish(&layout, &id)
            .map_err(|source| CoreError::PublishFailed {
                id: id.clone(),
                source,
            })?;

        advance(&mut state, ReconcileState::Done)?;
        info!("published {} as {}", layout.build_file_name(&id), layout.alias_file_name());
        Ok(ApplyOutcome {
            identifier: id,
            built: true,
            previous: drift.current,
            changes: drift.changes,
        })
    }

    pub fn list(&self, desired: &DesiredConfiguration) -> Result<BuildListing, CoreError> {
        let ledger = self.ledger_for(desired);
        Ok(BuildListing {
            alias: ledger.current_alias()?,
            builds: ledger.list_builds()?,
        })
    }

    pub fn resolve(
        &self,
        desired: &DesiredConfiguration,
        selector: &BuildSelector,
    ) -> Result<BuildIdentifier, CoreError> {
        let ledger = self.ledger_for(desired);
        let id = match selector {
            BuildSelector::Latest => ledger.current_alias()?.ok_or_else(|| {
                StoreError::BuildNotFound(ledger.layout().alias_file_name())
            })?,
            BuildSelector::Release(release) => {
                BuildIdentifier::new(desired.package.base_version.clone(), *release)
                    .map_err(|e| CoreError::InvalidSelector(e.to_string()))?
            }
            BuildSelector::Exact(id) => id.clone(),
        };
        if !ledger.list_builds()?.contains(&id) {
            return Err(StoreError::BuildNotFound(ledger.layout().build_file_name(&id)).into());
        }
        Ok(id)
    }

    /// Record embedded in the selected build.
    pub fn inspect(
        &self,
        desired: &DesiredConfiguration,
        selector: &BuildSelector,
    ) -> Result<BuildRecord, CoreError> {
        let id = self.resolve(desired, selector)?;
        let path = self.layout_for(desired).build_path(&id);
        Ok(self.packager.read_record(&path)?)
    }

    /// Check the alias and the record of every build of this package.
    pub fn verify(&self, desired: &DesiredConfiguration) -> Result<VerifyReport, CoreError> {
        let ledger = self.ledger_for(desired);
        let alias = ledger.current_alias()?;
        let builds = ledger.list_builds()?;

        let mut report = VerifyReport {
            alias: alias.clone(),
            ..VerifyReport::default()
        };
        for id in builds {
            report.checked += 1;
            let path = ledger.layout().build_path(&id);
            let problem = match self.packager.read_record(&path) {
                Ok(record) if record.identifier == id => None,
                Ok(record) => Some(format!("records identifier {}", record.identifier)),
                Err(e) => Some(e.to_string()),
            };
            if let Some(reason) = problem {
                warn!("{}: {reason}", ledger.layout().build_file_name(&id));
                report.unreadable.push((id, reason));
            } else if alias.as_ref().is_some_and(|a| *a < id) {
                report.orphans.push(id);
            }
        }
        Ok(report)
    }

    /// Remove old builds, keeping the newest `keep` and the alias target.
    pub fn prune(
        &self,
        desired: &DesiredConfiguration,
        keep: usize,
        dry_run: bool,
    ) -> Result<PruneReport, CoreError> {
        let layout = self.layout_for(desired);
        if !layout.dir().is_dir() {
            return Ok(PruneReport::default());
        }
        let _lock = if dry_run {
            None
        } else {
            Some(DestinationLock::acquire(&layout.lock_file())?)
        };
        Ok(Pruner::new(layout).collect(keep, dry_run)?)
    }

    /// Identifier the next build of `desired` would get.
    pub fn next_version(&self, desired: &DesiredConfiguration) -> Result<BuildIdentifier, CoreError> {
        Ok(self
            .ledger_for(desired)
            .next_version(&desired.package.base_version)?)
    }
}
