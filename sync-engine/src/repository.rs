//! Repository Facade: the capability the engine needs to enumerate packages
//! and materialize files, consumed from whatever actually reads `Sources` /
//! `Packages` indices. Implementations live in sibling crates
//! (`archive-repo` for real archives, `archive-mock` for tests).

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{BinaryPackage, FileRef, SourcePackage};

/// Failures reading or fetching from a source or target archive.
#[derive(Debug, Error)]
#[error("repository error at {base_location} ({context}): {source}")]
pub struct RepositoryError {
    pub base_location: String,
    pub context: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl RepositoryError {
    pub fn new(
        base_location: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            base_location: base_location.into(),
            context: context.into(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
pub trait RepositoryFacade: Send + Sync {
    /// All source packages in `(suite, component)`.
    async fn source_packages(
        &self,
        suite: &str,
        component: &str,
    ) -> Result<Vec<SourcePackage>, RepositoryError>;

    /// All ordinary binary packages in `(suite, component, arch)`.
    async fn binary_packages(
        &self,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError>;

    /// All `d-i` installer packages in `(suite, component, arch)`, enumerated
    /// separately from `binary_packages` but merged into the same binary
    /// index by the caller.
    async fn installer_packages(
        &self,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError>;

    /// Ensures `file` is present on local disk, fetching it over the network
    /// if needed. Idempotent; safe to call concurrently for distinct files.
    async fn materialize(&self, file: &FileRef) -> Result<PathBuf, RepositoryError>;

    /// Human-readable identifier for diagnostics.
    fn base_location(&self) -> &str;
}
