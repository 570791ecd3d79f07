//! The engine's error taxonomy.

use thiserror::Error;

use crate::{dak::DakError, repository::RepositoryError, version::VersionParseError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration gate (`sync_enabled`) was closed.
    #[error("sync is disabled in configuration")]
    SyncDisabled,

    /// `sync_packages` was called with an empty `names` list.
    #[error("sync_packages requires at least one package name")]
    EmptyNames,

    /// A malformed version string; fatal for the current package only, the
    /// engine logs a warning and skips.
    #[error(transparent)]
    VersionParse(#[from] VersionParseError),

    /// I/O or parse failure reading an index or materializing a file; fatal
    /// for the current batch.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A source package inconsistency (e.g. no `.dsc` file).
    #[error("consistency error for {package} in {base_location}: {detail}")]
    Consistency {
        package: String,
        base_location: String,
        detail: String,
    },

    /// The Dak facade rejected an import.
    #[error(transparent)]
    ImportRejected(#[from] DakError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
