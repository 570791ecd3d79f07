//! Dak Facade: the capability to import already-materialized files into the
//! target archive. Implementations live in sibling crates (`archive-dak` for
//! the real archive-management tool, `archive-mock` for tests).

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("dak import error for {suite}/{component}: {source}")]
pub struct DakError {
    pub suite: String,
    pub component: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl DakError {
    pub fn new(
        suite: impl Into<String>,
        component: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            suite: suite.into(),
            component: component.into(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
pub trait DakFacade: Send + Sync {
    /// Imports `local_paths` into `(suite, component)`.
    ///
    /// Returns `false` on any rejection by the archive-management tool; the
    /// import is assumed to have registered the package on `true`. Not
    /// assumed idempotent: the engine ensures it never re-submits the same
    /// package within a run.
    async fn import_files(
        &self,
        suite: &str,
        component: &str,
        local_paths: &[&Path],
        trusted: bool,
        allow_new: bool,
    ) -> Result<bool, DakError>;
}
