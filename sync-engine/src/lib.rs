//! Package synchronization engine for a Debian-derivative distribution.
//!
//! Given a *source* archive and a *target* archive, indexed by
//! `(suite, component, [architecture])`, this crate computes which source
//! and binary packages should be copied from source to target and drives
//! their import through an external archive-management tool ("Dak").
//!
//! The engine is generic over the [`RepositoryFacade`] and [`DakFacade`]
//! traits; it never reads a repository index or invokes an archive tool
//! itself. See the `archive-repo` and `archive-dak` crates for concrete
//! implementations, and `archive-mock` for test doubles.

mod concurrency;
mod engine;
mod error;
mod index;
mod model;

pub mod dak;
pub mod repository;
pub mod version;

pub use engine::SyncEngine;
pub use error::{EngineError, Result};
pub use index::{build_index, merge_installer_packages, PackageIndex};
pub use model::{BinaryPackage, EngineConfig, FileLocator, FileRef, PackageName, SourcePackage, Suite};
