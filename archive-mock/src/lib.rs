//! In-memory `RepositoryFacade`/`DakFacade` test doubles: fixtures built up
//! once, queried and recorded against in tests without any real network or
//! subprocess I/O.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use sync_engine::{
    dak::{DakError, DakFacade},
    repository::{RepositoryError, RepositoryFacade},
    BinaryPackage, FileRef, SourcePackage,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("mock repository failed to materialize {0}")]
struct SimulatedMaterializeFailure(String);

type SourceKey = (String, String);
type BinaryKey = (String, String, String);

/// Builds an [`InMemoryRepositoryFacade`] fixture.
#[derive(Default)]
pub struct RepositoryFixtureBuilder {
    sources: HashMap<SourceKey, Vec<SourcePackage>>,
    binaries: HashMap<BinaryKey, Vec<BinaryPackage>>,
    installers: HashMap<BinaryKey, Vec<BinaryPackage>>,
}

impl RepositoryFixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(mut self, suite: &str, component: &str, pkg: SourcePackage) -> Self {
        self.sources
            .entry((suite.to_owned(), component.to_owned()))
            .or_default()
            .push(pkg);
        self
    }

    pub fn add_binary(mut self, suite: &str, component: &str, arch: &str, pkg: BinaryPackage) -> Self {
        self.binaries
            .entry((suite.to_owned(), component.to_owned(), arch.to_owned()))
            .or_default()
            .push(pkg);
        self
    }

    pub fn add_installer(mut self, suite: &str, component: &str, arch: &str, pkg: BinaryPackage) -> Self {
        self.installers
            .entry((suite.to_owned(), component.to_owned(), arch.to_owned()))
            .or_default()
            .push(pkg);
        self
    }

    pub fn build(self, base_location: impl Into<String>) -> InMemoryRepositoryFacade {
        InMemoryRepositoryFacade {
            base_location: base_location.into(),
            sources: self.sources,
            binaries: self.binaries,
            installers: self.installers,
            materialized: Mutex::new(Vec::new()),
            fail_materialize: Mutex::new(HashSet::new()),
        }
    }
}

/// A canned repository: returns whatever was registered via
/// [`RepositoryFixtureBuilder`] and fabricates a deterministic local path on
/// `materialize` without touching the filesystem.
pub struct InMemoryRepositoryFacade {
    base_location: String,
    sources: HashMap<SourceKey, Vec<SourcePackage>>,
    binaries: HashMap<BinaryKey, Vec<BinaryPackage>>,
    installers: HashMap<BinaryKey, Vec<BinaryPackage>>,
    materialized: Mutex<Vec<String>>,
    fail_materialize: Mutex<HashSet<String>>,
}

impl InMemoryRepositoryFacade {
    /// Causes the next `materialize` call for `filename` to fail with a
    /// `RepositoryError`, to exercise the batch-fatal path.
    pub fn fail_to_materialize(&self, filename: &str) {
        self.fail_materialize.lock().unwrap().insert(filename.to_owned());
    }

    /// Filenames actually passed to `materialize`, in call order.
    pub fn materialized_files(&self) -> Vec<String> {
        self.materialized.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryFacade for InMemoryRepositoryFacade {
    async fn source_packages(
        &self,
        suite: &str,
        component: &str,
    ) -> Result<Vec<SourcePackage>, RepositoryError> {
        Ok(self
            .sources
            .get(&(suite.to_owned(), component.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn binary_packages(
        &self,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError> {
        Ok(self
            .binaries
            .get(&(suite.to_owned(), component.to_owned(), arch.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn installer_packages(
        &self,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError> {
        Ok(self
            .installers
            .get(&(suite.to_owned(), component.to_owned(), arch.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn materialize(&self, file: &FileRef) -> Result<PathBuf, RepositoryError> {
        if self.fail_materialize.lock().unwrap().contains(&file.filename) {
            return Err(RepositoryError::new(
                self.base_location.clone(),
                "materialize",
                SimulatedMaterializeFailure(file.filename.clone()),
            ));
        }

        self.materialized.lock().unwrap().push(file.filename.clone());
        Ok(PathBuf::from(format!("/virtual/{}/{}", self.base_location, file.filename)))
    }

    fn base_location(&self) -> &str {
        &self.base_location
    }
}

/// One recorded call to [`InMemoryDakFacade::import_files`].
#[derive(Clone, Debug)]
pub struct ImportCall {
    pub suite: String,
    pub component: String,
    pub paths: Vec<PathBuf>,
    pub trusted: bool,
    pub allow_new: bool,
}

/// A canned Dak facade: records every import call and rejects batches
/// containing a filename registered via [`InMemoryDakFacade::reject_filename`].
#[derive(Default)]
pub struct InMemoryDakFacade {
    calls: Mutex<Vec<ImportCall>>,
    reject: Mutex<HashSet<String>>,
}

impl InMemoryDakFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_filename(&self, filename: &str) {
        self.reject.lock().unwrap().insert(filename.to_owned());
    }

    pub fn calls(&self) -> Vec<ImportCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DakFacade for InMemoryDakFacade {
    async fn import_files(
        &self,
        suite: &str,
        component: &str,
        local_paths: &[&Path],
        trusted: bool,
        allow_new: bool,
    ) -> Result<bool, DakError> {
        let paths: Vec<PathBuf> = local_paths.iter().map(|p| p.to_path_buf()).collect();

        let rejected = {
            let reject = self.reject.lock().unwrap();
            paths.iter().any(|p| {
                p.file_name()
                    .and_then(|f| f.to_str())
                    .is_some_and(|name| reject.contains(name))
            })
        };

        self.calls.lock().unwrap().push(ImportCall {
            suite: suite.to_owned(),
            component: component.to_owned(),
            paths,
            trusted,
            allow_new,
        });

        Ok(!rejected)
    }
}

// Lets tests keep a handle on the facade for assertions (`calls()`) after
// handing one half of the `Arc` to a `SyncEngine`.
#[async_trait]
impl DakFacade for Arc<InMemoryDakFacade> {
    async fn import_files(
        &self,
        suite: &str,
        component: &str,
        local_paths: &[&Path],
        trusted: bool,
        allow_new: bool,
    ) -> Result<bool, DakError> {
        self.as_ref()
            .import_files(suite, component, local_paths, trusted, allow_new)
            .await
    }
}
