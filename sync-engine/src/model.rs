//! The engine's data model: source/binary packages, file references and the
//! per-run configuration.

use std::{
    collections::BTreeSet,
    fmt::Display,
    path::PathBuf,
    sync::Arc,
};

use serde::Deserialize;
use url::Url;

/// A package name, cheap to clone and compare.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PackageName {
    name: Arc<String>,
}

impl PackageName {
    pub fn new(name: String) -> Self {
        Self {
            name: Arc::new(name),
        }
    }

    pub fn as_str(&self) -> &str {
        self.name.as_ref()
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        PackageName::new(s)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        PackageName::new(s.to_string())
    }
}

/// Where a [`FileRef`] actually lives. Opaque to the engine beyond `Display`;
/// only a `RepositoryFacade` implementation interprets it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileLocator {
    Path(PathBuf),
    Url(Url),
}

impl Display for FileLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileLocator::Path(path) => write!(f, "{}", path.display()),
            FileLocator::Url(url) => write!(f, "{url}"),
        }
    }
}

/// A single file belonging to a source or binary package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    pub filename: String,
    pub locator: FileLocator,
}

impl FileRef {
    pub fn new(filename: impl Into<String>, locator: FileLocator) -> Self {
        Self {
            filename: filename.into(),
            locator,
        }
    }

    pub fn is_dsc(&self) -> bool {
        self.filename.ends_with(".dsc")
    }
}

impl Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.locator)
    }
}

/// A source package: a `.dsc` plus the files it references, and the binaries
/// it is expected to produce.
#[derive(Clone, Debug)]
pub struct SourcePackage {
    pub name: PackageName,
    pub version: String,
    pub component: String,
    /// Exactly one entry must satisfy [`FileRef::is_dsc`].
    pub files: Vec<FileRef>,
    /// `(binary_name, expected_version)` pairs, as recorded in the `.dsc`.
    pub binaries: Vec<(PackageName, String)>,
}

impl SourcePackage {
    pub fn dsc_file(&self) -> Option<&FileRef> {
        self.files.iter().find(|f| f.is_dsc())
    }
}

/// A binary (`.deb`) package, possibly a `d-i` installer package.
#[derive(Clone, Debug)]
pub struct BinaryPackage {
    pub name: PackageName,
    pub version: String,
    pub architecture: String,
    pub component: String,
    pub source_name: PackageName,
    pub source_version: String,
    pub file: FileRef,
    pub is_installer: bool,
}

/// A release channel within an archive.
#[derive(Clone, Debug, Deserialize)]
pub struct Suite {
    pub name: String,
    pub components: Vec<String>,
    pub architectures: BTreeSet<String>,
}

impl Suite {
    /// Architectures for binary enumeration: `architectures` minus the
    /// pseudo-architecture `source`.
    pub fn binary_architectures(&self) -> impl Iterator<Item = &str> {
        self.architectures.iter().map(String::as_str).filter(|a| *a != "source")
    }
}

/// Immutable configuration for a single sync run.
#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    /// Destination suite name.
    pub target_suite: Suite,
    /// Substring identifying local fork revisions (e.g. `tanglu`).
    pub distro_tag: String,
    /// Master gate; both entry points fail fast with `SyncDisabledError` when false.
    pub sync_enabled: bool,
    /// When false, binaries are never copied.
    pub sync_binaries: bool,
    /// Passed through to the Dak facade on every import.
    pub imports_trusted: bool,
    /// Source archive parameters.
    pub source_suite_name: String,
    pub source_repo_url: Url,
    pub source_name: String,
    pub source_keyrings: Vec<PathBuf>,
}
