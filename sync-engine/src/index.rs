//! Package Index: `name -> newest package` maps, built once per
//! `(component, [arch])` and read-only thereafter.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::{model::PackageName, version};

/// A read-only, newest-wins snapshot of packages keyed by name.
///
/// Iteration order is `BTreeMap` order (lexicographic by name); per the
/// spec's invariants this is never load-bearing for correctness, only for
/// log legibility.
#[derive(Debug, Clone)]
pub struct PackageIndex<T> {
    by_name: BTreeMap<PackageName, T>,
}

impl<T> PackageIndex<T> {
    pub fn empty() -> Self {
        Self {
            by_name: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &PackageName) -> Option<&T> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &PackageName) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &T)> {
        self.by_name.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.by_name.values()
    }
}

/// Builds a Package Index out of an arbitrary package list: for each input
/// package, keeps the entry whose version is greatest under Debian
/// ordering. Ties on version keep the first package encountered (stable).
pub fn build_index<T>(
    packages: impl IntoIterator<Item = T>,
    name_of: impl Fn(&T) -> &PackageName,
    version_of: impl Fn(&T) -> &str,
) -> Result<PackageIndex<T>, version::VersionParseError> {
    let mut by_name: BTreeMap<PackageName, T> = BTreeMap::new();

    for pkg in packages {
        let name = name_of(&pkg).clone();
        match by_name.get(&name) {
            None => {
                by_name.insert(name, pkg);
            }
            Some(existing) => {
                if version::compare(version_of(&pkg), version_of(existing))? == Ordering::Greater {
                    by_name.insert(name, pkg);
                }
            }
        }
    }

    Ok(PackageIndex { by_name })
}

/// Merges installer ("d-i") packages into an already-built binary index.
///
/// Installer packages first newest-win among themselves (same rule as
/// `build_index`), then are merged into `base`: an installer package
/// replaces a regular package of identical name only when its version is
/// *strictly* greater; if `base` has no entry of that name, the installer
/// package is simply added.
pub fn merge_installer_packages<T>(
    base: &mut PackageIndex<T>,
    installer_packages: impl IntoIterator<Item = T>,
    name_of: impl Fn(&T) -> &PackageName,
    version_of: impl Fn(&T) -> &str,
) -> Result<(), version::VersionParseError> {
    let installer_index = build_index(installer_packages, &name_of, &version_of)?;

    for (name, pkg) in installer_index.by_name {
        match base.by_name.get(&name) {
            None => {
                base.by_name.insert(name, pkg);
            }
            Some(existing) => {
                if version::compare(version_of(&pkg), version_of(existing))? == Ordering::Greater {
                    base.by_name.insert(name, pkg);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Pkg {
        name: PackageName,
        version: String,
    }

    fn pkg(name: &str, version: &str) -> Pkg {
        Pkg {
            name: name.into(),
            version: version.to_owned(),
        }
    }

    #[test]
    fn keeps_newest_version_per_name() {
        let index = build_index(
            [pkg("foo", "1.0-1"), pkg("foo", "2.0-1"), pkg("foo", "1.5-1")],
            |p| &p.name,
            |p| &p.version,
        )
        .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&"foo".into()).unwrap().version, "2.0-1");
    }

    #[test]
    fn ties_keep_first_encountered() {
        let first = pkg("foo", "1.0-1");
        let index = build_index(
            [first.clone(), pkg("foo", "1.0-1")],
            |p| &p.name,
            |p| &p.version,
        )
        .unwrap();

        assert_eq!(index.get(&"foo".into()).unwrap(), &first);
    }

    #[test]
    fn installer_packages_replace_only_when_strictly_newer() {
        let mut index = build_index([pkg("foo", "1.0-1")], |p| &p.name, |p| &p.version).unwrap();

        merge_installer_packages(&mut index, [pkg("foo", "1.0-1")], |p| &p.name, |p| &p.version)
            .unwrap();
        assert_eq!(index.get(&"foo".into()).unwrap().version, "1.0-1");

        merge_installer_packages(&mut index, [pkg("foo", "2.0-1")], |p| &p.name, |p| &p.version)
            .unwrap();
        assert_eq!(index.get(&"foo".into()).unwrap().version, "2.0-1");
    }

    #[test]
    fn installer_only_packages_are_added() {
        let mut index: PackageIndex<Pkg> = PackageIndex::empty();
        merge_installer_packages(&mut index, [pkg("d-i-kernel", "1.0-1")], |p| &p.name, |p| &p.version)
            .unwrap();
        assert!(index.contains(&"d-i-kernel".into()));
    }
}
