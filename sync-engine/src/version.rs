//! Debian-style version ordering.
//!
//! Comparison is delegated to [`debian_packaging::package_version::PackageVersion`],
//! which already implements the epoch/upstream/revision, tilde-aware algorithm
//! from Debian policy. This module only adds the thin, pure wrapper the rest of
//! the engine is written against, plus `debian_revision`, whose "empty string
//! when absent" semantics differ from the upstream crate's `Option<&str>`.

use std::cmp::Ordering;

use debian_packaging::package_version::PackageVersion;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("malformed package version '{version}': {source}")]
pub struct VersionParseError {
    pub version: String,
    #[source]
    pub source: debian_packaging::package_version::VersionError,
}

fn parse(version: &str) -> Result<PackageVersion, VersionParseError> {
    PackageVersion::parse(version).map_err(|source| VersionParseError {
        version: version.to_owned(),
        source,
    })
}

/// Compares two version strings under `dpkg --compare-versions` semantics.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionParseError> {
    Ok(parse(a)?.cmp(&parse(b)?))
}

/// Returns the Debian revision suffix: the substring after the last `-`, or
/// the empty string if the version carries no revision.
pub fn debian_revision(version: &str) -> &str {
    match version.rfind('-') {
        Some(pos) => &version[pos + 1..],
        None => "",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compare_orders_epoch_upstream_and_revision() {
        assert_eq!(compare("1.0-1", "1.0-2").unwrap(), Ordering::Less);
        assert_eq!(compare("2:1.0-1", "3.0-99").unwrap(), Ordering::Greater);
        assert_eq!(compare("1.0-1", "1.0-1").unwrap(), Ordering::Equal);
    }

    #[test]
    fn compare_treats_tilde_as_less_than_end_of_string() {
        assert_eq!(compare("1.0~beta1", "1.0").unwrap(), Ordering::Less);
    }

    #[test]
    fn compare_rejects_malformed_versions() {
        let err = compare("1.0::bad", "1.0").unwrap_err();
        assert_eq!(err.version, "1.0::bad");
    }

    #[test]
    fn debian_revision_extracts_suffix_after_last_hyphen() {
        assert_eq!(debian_revision("1.2-3"), "3");
        assert_eq!(debian_revision("1.2-3tanglu1"), "3tanglu1");
        assert_eq!(debian_revision("2.0-0tanglu1-2"), "2");
    }

    #[test]
    fn debian_revision_is_empty_when_absent() {
        assert_eq!(debian_revision("1.2"), "");
    }
}
