use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use archive_mock::{ImportCall, InMemoryDakFacade, RepositoryFixtureBuilder};
use sync_engine::{
    BinaryPackage, EngineConfig, EngineError, FileLocator, FileRef, PackageName, SourcePackage,
    Suite, SyncEngine,
};
use url::Url;

fn dsc_name(name: &str, version: &str) -> String {
    format!("{name}_{version}.dsc")
}

fn source_pkg(name: &str, version: &str, component: &str, binaries: &[(&str, &str)]) -> SourcePackage {
    SourcePackage {
        name: name.into(),
        version: version.to_owned(),
        component: component.to_owned(),
        files: vec![FileRef::new(
            dsc_name(name, version),
            FileLocator::Path(PathBuf::from(format!("/src/{}", dsc_name(name, version)))),
        )],
        binaries: binaries
            .iter()
            .map(|(n, v)| (PackageName::from(*n), (*v).to_owned()))
            .collect(),
    }
}

fn binary_pkg(
    name: &str,
    version: &str,
    arch: &str,
    component: &str,
    source_name: &str,
    source_version: &str,
) -> BinaryPackage {
    let filename = format!("{name}_{version}_{arch}.deb");
    BinaryPackage {
        name: name.into(),
        version: version.to_owned(),
        architecture: arch.to_owned(),
        component: component.to_owned(),
        source_name: source_name.into(),
        source_version: source_version.to_owned(),
        file: FileRef::new(filename.clone(), FileLocator::Path(PathBuf::from(format!("/src/{filename}")))),
        is_installer: false,
    }
}

fn config(sync_binaries: bool, distro_tag: &str) -> EngineConfig {
    EngineConfig {
        target_suite: Suite {
            name: "target".into(),
            components: vec!["main".into()],
            architectures: BTreeSet::from(["amd64".to_string(), "source".to_string()]),
        },
        distro_tag: distro_tag.to_owned(),
        sync_enabled: true,
        sync_binaries,
        imports_trusted: true,
        source_suite_name: "unstable".into(),
        source_repo_url: Url::parse("https://example.invalid/debian").unwrap(),
        source_name: "debian".into(),
        source_keyrings: vec![],
    }
}

fn dak() -> (Arc<InMemoryDakFacade>, Arc<InMemoryDakFacade>) {
    let dak = Arc::new(InMemoryDakFacade::new());
    (dak.clone(), dak)
}

fn calls(dak: &InMemoryDakFacade) -> Vec<ImportCall> {
    dak.calls()
}

#[tokio::test]
async fn s1_new_source_sync_imports_source_and_binaries() {
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("foo", "1.2-1", "main", &[("foo", "1.2-1")]))
        .add_binary("unstable", "main", "amd64", binary_pkg("foo", "1.2-1", "amd64", "main", "foo", "1.2-1"))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new().build("target-archive");
    let (engine_dak, dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(true, "tanglu"));
    let ok = engine
        .sync_packages("main", &[PackageName::from("foo")], false)
        .await
        .unwrap();
    assert!(ok);

    let recorded = calls(&dak);
    assert_eq!(recorded.len(), 2, "expected one source import and one binary import");
    assert!(recorded[0].paths[0].to_string_lossy().ends_with("foo_1.2-1.dsc"));
    assert!(recorded[1].paths[0].to_string_lossy().ends_with("foo_1.2-1_amd64.deb"));
}

#[tokio::test]
async fn s2_autosync_skips_locally_modified_fork() {
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("bar", "2.0-1", "main", &[]))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new()
        .add_source("target", "main", source_pkg("bar", "2.0-0tanglu1", "main", &[]))
        .build("target-archive");
    let (engine_dak, dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(false, "tanglu"));
    let ok = engine.autosync().await.unwrap();
    assert!(ok);
    assert!(calls(&dak).is_empty(), "fork must never be overwritten by autosync");
}

#[tokio::test]
async fn s3_equal_versions_are_left_untouched() {
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("baz", "3.0-2", "main", &[]))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new()
        .add_source("target", "main", source_pkg("baz", "3.0-2", "main", &[]))
        .build("target-archive");
    let (engine_dak, dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(false, "tanglu"));
    let ok = engine
        .sync_packages("main", &[PackageName::from("baz")], false)
        .await
        .unwrap();
    assert!(ok);
    assert!(calls(&dak).is_empty());
}

#[tokio::test]
async fn s4_binary_version_mismatch_is_skipped_but_source_proceeds() {
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("qux", "1.0-1", "main", &[("qux", "1.0-1")]))
        .add_binary("unstable", "main", "amd64", binary_pkg("qux", "0.9-1", "amd64", "main", "qux", "0.9-1"))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new().build("target-archive");
    let (engine_dak, dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(true, "tanglu"));
    let ok = engine
        .sync_packages("main", &[PackageName::from("qux")], false)
        .await
        .unwrap();
    assert!(ok);

    let recorded = calls(&dak);
    assert_eq!(recorded.len(), 1, "only the source import should have been submitted");
    assert!(recorded[0].paths[0].to_string_lossy().ends_with("qux_1.0-1.dsc"));
}

#[tokio::test]
async fn s5_dak_rejection_of_source_is_fatal_and_skips_binaries() {
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("foo", "1.2-1", "main", &[("foo", "1.2-1")]))
        .add_binary("unstable", "main", "amd64", binary_pkg("foo", "1.2-1", "amd64", "main", "foo", "1.2-1"))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new().build("target-archive");
    let (engine_dak, dak) = dak();
    dak.reject_filename("foo_1.2-1.dsc");

    let engine = SyncEngine::new(source, target, engine_dak, config(true, "tanglu"));
    let ok = engine
        .sync_packages("main", &[PackageName::from("foo")], false)
        .await
        .unwrap();
    assert!(!ok);

    let recorded = calls(&dak);
    assert_eq!(recorded.len(), 1, "no binary import should be attempted once source import is rejected");
}

#[tokio::test]
async fn s6_force_overrides_a_newer_target_version() {
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("lib", "2.0-1", "main", &[]))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new()
        .add_source("target", "main", source_pkg("lib", "2.1-1", "main", &[]))
        .build("target-archive");
    let (engine_dak, dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(false, "tanglu"));
    let ok = engine
        .sync_packages("main", &[PackageName::from("lib")], true)
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(calls(&dak).len(), 1);
}

#[tokio::test]
async fn empty_names_is_a_precondition_violation() {
    let source = RepositoryFixtureBuilder::new().build("source-archive");
    let target = RepositoryFixtureBuilder::new().build("target-archive");
    let (engine_dak, _dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(false, "tanglu"));
    let err = engine.sync_packages("main", &[], false).await.unwrap_err();
    assert!(matches!(err, EngineError::EmptyNames));
}

#[tokio::test]
async fn sync_disabled_is_surfaced_to_the_caller() {
    let source = RepositoryFixtureBuilder::new().build("source-archive");
    let target = RepositoryFixtureBuilder::new().build("target-archive");
    let (engine_dak, _dak) = dak();

    let mut cfg = config(false, "tanglu");
    cfg.sync_enabled = false;
    let engine = SyncEngine::new(source, target, engine_dak, cfg);
    let err = engine.autosync().await.unwrap_err();
    assert!(matches!(err, EngineError::SyncDisabled));
}

#[tokio::test]
async fn missing_architecture_in_source_index_is_not_fatal() {
    // "amd64" is a target architecture but the source repository has no
    // packages for it at all; the (spkg, arch) pair must contribute nothing
    // and must not fail the batch.
    let source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("foo", "1.2-1", "main", &[("foo", "1.2-1")]))
        .build("source-archive");
    let target = RepositoryFixtureBuilder::new().build("target-archive");
    let (engine_dak, dak) = dak();

    let engine = SyncEngine::new(source, target, engine_dak, config(true, "tanglu"));
    let ok = engine
        .sync_packages("main", &[PackageName::from("foo")], false)
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(calls(&dak).len(), 1, "only the source import, binary scan found nothing");
}

#[tokio::test]
async fn second_run_against_an_already_synced_target_is_a_no_op() {
    // Simulates running sync_packages twice: the second run's target facade
    // reflects what the first run's Dak import would have produced.
    let first_source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("foo", "1.2-1", "main", &[]))
        .build("source-archive");
    let first_target = RepositoryFixtureBuilder::new().build("target-archive");
    let (first_engine_dak, first_dak) = dak();
    let first = SyncEngine::new(first_source, first_target, first_engine_dak, config(false, "tanglu"));
    assert!(first
        .sync_packages("main", &[PackageName::from("foo")], false)
        .await
        .unwrap());
    assert_eq!(calls(&first_dak).len(), 1);

    let second_source = RepositoryFixtureBuilder::new()
        .add_source("unstable", "main", source_pkg("foo", "1.2-1", "main", &[]))
        .build("source-archive");
    let second_target = RepositoryFixtureBuilder::new()
        .add_source("target", "main", source_pkg("foo", "1.2-1", "main", &[]))
        .build("target-archive");
    let (second_engine_dak, second_dak) = dak();
    let second = SyncEngine::new(second_source, second_target, second_engine_dak, config(false, "tanglu"));
    assert!(second
        .sync_packages("main", &[PackageName::from("foo")], false)
        .await
        .unwrap());
    assert!(calls(&second_dak).is_empty(), "nothing changed upstream, so nothing should be imported again");
}
