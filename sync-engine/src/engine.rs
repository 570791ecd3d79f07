//! The SyncEngine: orchestrates selection, fetch and import for both the
//! targeted (`sync_packages`) and fleet-wide (`autosync`) entry points.

use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info, warn};

use crate::{
    concurrency::TaskRunner,
    dak::DakFacade,
    error::{EngineError, Result},
    index::{self, PackageIndex},
    model::{BinaryPackage, EngineConfig, PackageName, SourcePackage},
    repository::RepositoryFacade,
    version,
};

/// Upper bound on concurrently in-flight binary-candidate materializations
/// for a single `(source package, architecture)` pair. Keeps the scan from
/// hammering the source repository while still hiding network latency.
const MAX_PARALLEL_BINARY_SCANS: usize = 4;

async fn build_source_index<R: RepositoryFacade>(
    repo: &R,
    suite: &str,
    component: &str,
) -> Result<PackageIndex<SourcePackage>> {
    let packages = repo.source_packages(suite, component).await?;
    Ok(index::build_index(packages, |p| &p.name, |p| p.version.as_str())?)
}

async fn build_binary_index<R: RepositoryFacade>(
    repo: &R,
    suite: &str,
    component: &str,
    arch: &str,
) -> Result<PackageIndex<BinaryPackage>> {
    let regular = repo.binary_packages(suite, component, arch).await?;
    let mut idx = index::build_index(regular, |p| &p.name, |p| p.version.as_str())?;

    let installer = repo.installer_packages(suite, component, arch).await?;
    index::merge_installer_packages(&mut idx, installer, |p| &p.name, |p| p.version.as_str())?;

    Ok(idx)
}

/// Orchestrates the selection → fetch → import pipeline. Constructed per
/// run, holds no persistent mutable state, and is discarded afterward.
pub struct SyncEngine<Source, Target, Dak> {
    source: Source,
    target: Target,
    dak: Dak,
    config: EngineConfig,
}

impl<Source, Target, Dak> SyncEngine<Source, Target, Dak>
where
    Source: RepositoryFacade,
    Target: RepositoryFacade,
    Dak: DakFacade,
{
    pub fn new(source: Source, target: Target, dak: Dak, config: EngineConfig) -> Self {
        Self {
            source,
            target,
            dak,
            config,
        }
    }

    /// Syncs the named source packages (and, if enabled, their binaries)
    /// from the source archive's `component` into the target archive.
    ///
    /// `force` bypasses the target-version-greater check but never the
    /// modified-fork check: targeted sync is assumed operator-initiated and
    /// authoritative, so the fork check is never evaluated here at all.
    pub async fn sync_packages(
        &self,
        component: &str,
        names: &[PackageName],
        force: bool,
    ) -> Result<bool> {
        if !self.config.sync_enabled {
            return Err(EngineError::SyncDisabled);
        }
        if names.is_empty() {
            return Err(EngineError::EmptyNames);
        }

        let source_index =
            build_source_index(&self.source, &self.config.source_suite_name, component).await?;
        let target_index =
            build_source_index(&self.target, &self.config.target_suite.name, component).await?;

        let mut synced = Vec::new();

        for name in names {
            let Some(spkg) = source_index.get(name) else {
                info!(package = %name, component, "not present in source, skipping");
                continue;
            };

            if let Some(target_pkg) = target_index.get(name) {
                match version::compare(&target_pkg.version, &spkg.version) {
                    Ok(ordering) => {
                        if !force && ordering != Ordering::Less {
                            info!(
                                package = %name,
                                target_version = %target_pkg.version,
                                source_version = %spkg.version,
                                "target already at or ahead of source, skipping",
                            );
                            continue;
                        }
                    }
                    Err(e) => {
                        warn!(
                            package = %name,
                            target_version = %target_pkg.version,
                            source_version = %spkg.version,
                            error = %e,
                            "cannot compare versions, skipping",
                        );
                        continue;
                    }
                }
            }

            if !self.import_source_package(component, spkg).await? {
                return Ok(false);
            }
            synced.push(spkg.clone());
        }

        self.import_binaries_for_sources(component, &synced).await
    }

    /// Syncs every source package (and, if enabled, binaries) across all
    /// components of the target suite, skipping locally modified forks.
    pub async fn autosync(&self) -> Result<bool> {
        if !self.config.sync_enabled {
            return Err(EngineError::SyncDisabled);
        }

        for component in self.config.target_suite.components.clone() {
            let source_index =
                build_source_index(&self.source, &self.config.source_suite_name, &component)
                    .await?;
            let target_index =
                build_source_index(&self.target, &self.config.target_suite.name, &component)
                    .await?;

            // Scoped per component: carrying `synced` across components
            // would cause earlier components' sources to be reconsidered
            // for binary import under later components, which is not
            // what an operator syncing one component at a time expects.
            let mut synced = Vec::new();

            for (name, spkg) in source_index.iter() {
                if let Some(target_pkg) = target_index.get(name) {
                    match version::compare(&target_pkg.version, &spkg.version) {
                        Ok(ordering) => {
                            if ordering != Ordering::Less {
                                debug!(
                                    package = %name,
                                    target_version = %target_pkg.version,
                                    source_version = %spkg.version,
                                    "target already at or ahead of source, skipping",
                                );
                                continue;
                            }
                        }
                        Err(e) => {
                            warn!(
                                package = %name,
                                target_version = %target_pkg.version,
                                source_version = %spkg.version,
                                error = %e,
                                "cannot compare versions, skipping",
                            );
                            continue;
                        }
                    }

                    let revision = version::debian_revision(&target_pkg.version);
                    if revision.contains(self.config.distro_tag.as_str()) {
                        info!(
                            package = %name,
                            target_version = %target_pkg.version,
                            "has modifications, skipping",
                        );
                        continue;
                    }
                }

                if !self.import_source_package(&component, spkg).await? {
                    return Ok(false);
                }
                synced.push(spkg.clone());
            }

            if !self.import_binaries_for_sources(&component, &synced).await? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Materializes every file of `spkg` (the archive tool reads the `.dsc`
    /// to discover the remaining source files in the same directory, so
    /// they must all be locally available beforehand) and imports the
    /// `.dsc` into the target archive.
    async fn import_source_package(&self, component: &str, spkg: &SourcePackage) -> Result<bool> {
        let mut dsc_path: Option<PathBuf> = None;

        for file in &spkg.files {
            let path = self.source.materialize(file).await?;
            if file.is_dsc() {
                dsc_path = Some(path);
            }
        }

        let Some(dsc_path) = dsc_path else {
            error!(
                package = %spkg.name,
                base_location = self.source.base_location(),
                "source package has no .dsc file",
            );
            return Ok(false);
        };

        self.dak
            .import_files(
                &self.config.target_suite.name,
                component,
                &[dsc_path.as_path()],
                self.config.imports_trusted,
                true,
            )
            .await
            .map_err(Into::into)
    }

    /// For each `(source package, architecture)` pair, scans the source
    /// package's binary manifest concurrently, materializes anything that
    /// needs importing, and submits one batched import per pair.
    async fn import_binaries_for_sources(
        &self,
        component: &str,
        synced: &[SourcePackage],
    ) -> Result<bool> {
        if !self.config.sync_binaries {
            debug!(component, "binary sync disabled, skipping");
            return Ok(true);
        }

        let archs: Vec<String> = self
            .config
            .target_suite
            .binary_architectures()
            .map(str::to_owned)
            .collect();

        let mut source_cache: HashMap<String, PackageIndex<BinaryPackage>> = HashMap::new();
        let mut target_cache: HashMap<String, PackageIndex<BinaryPackage>> = HashMap::new();
        for arch in &archs {
            source_cache.insert(
                arch.clone(),
                build_binary_index(&self.source, &self.config.source_suite_name, component, arch)
                    .await?,
            );
            target_cache.insert(
                arch.clone(),
                build_binary_index(
                    &self.target,
                    &self.config.target_suite.name,
                    component,
                    arch,
                )
                .await?,
            );
        }

        for spkg in synced {
            for arch in &archs {
                let source_index = &source_cache[arch];
                let target_index = &target_cache[arch];

                let bin_files = tokio::sync::Mutex::new(Vec::<PathBuf>::new());
                let existing_packages = tokio::sync::Mutex::new(false);

                let mut runner = TaskRunner::new(MAX_PARALLEL_BINARY_SCANS);
                for (bin_name, bin_version) in &spkg.binaries {
                    runner
                        .push_when_space_available(self.scan_binary_candidate(
                            spkg,
                            bin_name,
                            bin_version,
                            source_index,
                            target_index,
                            &bin_files,
                            &existing_packages,
                        ))
                        .await?;
                }
                runner.wait_for_remaining().await?;

                let bin_files = bin_files.into_inner();
                let existing_packages = existing_packages.into_inner();

                if bin_files.is_empty() {
                    if !existing_packages {
                        warn!(source = %spkg.name, arch, "unable to sync any binary");
                    }
                    continue;
                }

                let paths: Vec<&Path> = bin_files.iter().map(PathBuf::as_path).collect();
                let imported = self
                    .dak
                    .import_files(
                        &self.config.target_suite.name,
                        component,
                        &paths,
                        self.config.imports_trusted,
                        true,
                    )
                    .await?;
                if !imported {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Evaluates one expected `(binary_name, binary_version)` entry from a
    /// source package's manifest against the per-architecture binary
    /// indices, materializing and recording it into `bin_files` if it needs
    /// importing.
    #[allow(clippy::too_many_arguments)]
    async fn scan_binary_candidate(
        &self,
        spkg: &SourcePackage,
        bin_name: &PackageName,
        bin_version: &str,
        source_index: &PackageIndex<BinaryPackage>,
        target_index: &PackageIndex<BinaryPackage>,
        bin_files: &tokio::sync::Mutex<Vec<PathBuf>>,
        existing_packages: &tokio::sync::Mutex<bool>,
    ) -> Result<()> {
        let Some(bin_pkg) = source_index.get(bin_name) else {
            return Ok(());
        };

        if bin_pkg.source_name != spkg.name {
            warn!(
                binary = %bin_name,
                source = %spkg.name,
                actual_source = %bin_pkg.source_name,
                "binary disowns this source, skipping",
            );
            return Ok(());
        }

        if bin_pkg.source_version != bin_version {
            info!(
                binary = %bin_name,
                manifest_version = bin_version,
                index_version = %bin_pkg.source_version,
                "binary manifest/index source version mismatch, skipping",
            );
            return Ok(());
        }

        if let Some(target_bin) = target_index.get(bin_name) {
            match version::compare(&target_bin.version, &bin_pkg.version) {
                Ok(ordering) => {
                    if ordering != Ordering::Less {
                        info!(
                            binary = %bin_name,
                            target_version = %target_bin.version,
                            source_version = %bin_pkg.version,
                            "target already at or ahead of source, skipping",
                        );
                        *existing_packages.lock().await = true;
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(
                        binary = %bin_name,
                        target_version = %target_bin.version,
                        source_version = %bin_pkg.version,
                        error = %e,
                        "cannot compare versions, skipping",
                    );
                    return Ok(());
                }
            }
        }

        let path = self.source.materialize(&bin_pkg.file).await?;
        bin_files.lock().await.push(path);
        Ok(())
    }
}
