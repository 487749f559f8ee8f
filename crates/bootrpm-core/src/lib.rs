//! Reconciliation engine for bootrpm.
//!
//! This crate ties the schema, the destination store and the packaging
//! backends into the `Reconciler`: `probe` answers whether the published
//! `latest` build already matches a desired configuration, `apply` converges
//! the destination by building the next release and repointing the alias.
//! It also provides the `ChangeDetector`, the `ArtifactBuilder`, the
//! per-destination lock and lifecycle state validation.

pub mod builder;
pub mod concurrency;
pub mod detector;
pub mod lifecycle;
pub mod reconciler;

pub use builder::ArtifactBuilder;
pub use concurrency::DestinationLock;
pub use detector::{ChangeDetector, Drift};
pub use lifecycle::{validate_transition, ReconcileState};
pub use reconciler::{
    ApplyOutcome, BuildListing, BuildSelector, ProbeReport, Reconciler, VerifyReport,
};

use bootrpm_schema::BuildIdentifier;
use bootrpm_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("ledger corrupt: {0}")]
    LedgerCorrupt(String),
    #[error("build {id} failed: {source}")]
    BuildFailed {
        id: BuildIdentifier,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("publishing {id} failed: {source}")]
    PublishFailed {
        id: BuildIdentifier,
        #[source]
        source: StoreError,
    },
    #[error("manifest error: {0}")]
    Config(#[from] bootrpm_schema::ConfigError),
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    #[error("packager error: {0}")]
    Packager(#[from] bootrpm_packager::PackagerError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("invalid build selector '{0}': expected 'latest', a release number, or <base>-<release>")]
    InvalidSelector(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LedgerCorrupt(msg) => CoreError::LedgerCorrupt(msg),
            other => CoreError::Store(other),
        }
    }
}
