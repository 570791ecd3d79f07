//! Concrete [`RepositoryFacade`] implementations reading real Debian-style
//! archives: `FilesystemRepositoryFacade` for a local mirror, and
//! `HttpRepositoryFacade` for one served over HTTP.

use std::path::PathBuf;

use async_trait::async_trait;
use backoff::{Error as BackoffError, ExponentialBackoff};
use debian_packaging::{
    binary_package_control::BinaryPackageControlFile,
    control::ControlParagraphAsyncReader,
    debian_source_control::DebianSourceControlFile,
    error::DebianError,
    io::{Compression, DataResolver},
    repository::{
        filesystem::FilesystemRepositoryReader, http::HttpRepositoryClient,
        release::ReleaseFileEntry, ReleaseReader, RepositoryRootReader,
    },
};
use futures::io::{AsyncBufRead, BufReader as AsyncBufReader};
use reqwest::Client;
use sync_engine::{
    repository::{RepositoryError, RepositoryFacade},
    BinaryPackage, FileLocator, FileRef, SourcePackage,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

async fn entry_reader(
    release: &dyn ReleaseReader,
    entry: &ReleaseFileEntry<'_>,
    context: &str,
) -> Result<ControlParagraphAsyncReader<impl AsyncBufRead>, RepositoryError> {
    let reader = release
        .get_path_with_digest_verification(entry.path, entry.size, entry.digest.clone())
        .await
        .map_err(|e| RepositoryError::new(context.to_owned(), "fetch index", e))?;
    Ok(ControlParagraphAsyncReader::new(AsyncBufReader::new(reader)))
}

/// Scans `(component, arch)`'s `Packages` index into [`BinaryPackage`]s,
/// locating each `.deb` via `locate`. `is_installer` distinguishes the
/// `debian-installer` sub-tree from the ordinary one; both are scanned the
/// same way and merged downstream by the engine.
async fn scan_binaries(
    release: &dyn ReleaseReader,
    context: &str,
    component: &str,
    arch: &str,
    is_installer: bool,
    locate: impl Fn(&str) -> FileLocator,
) -> Result<Vec<BinaryPackage>, RepositoryError> {
    let entry = match release.packages_entry(component, arch, is_installer) {
        Ok(entry) => entry,
        Err(DebianError::RepositoryReadPackagesIndicesEntryNotFound) => {
            info!(component, arch, is_installer, "no packages index, skipping");
            return Ok(Vec::new());
        }
        Err(e) => return Err(RepositoryError::new(context.to_owned(), "packages_entry", e)),
    };

    let mut reader = entry_reader(release, &entry, context).await?;
    let mut out = Vec::new();

    while let Some(paragraph) = reader
        .read_paragraph()
        .await
        .map_err(|e| RepositoryError::new(context.to_owned(), "read Packages paragraph", e))?
    {
        let bin = BinaryPackageControlFile::from(paragraph);
        let name = bin
            .package()
            .map_err(|e| RepositoryError::new(context.to_owned(), "Package field", e))?
            .to_owned();
        let version = bin
            .version_str()
            .map_err(|e| RepositoryError::new(context.to_owned(), "Version field", e))?
            .to_owned();
        let filename = bin
            .required_field_str("Filename")
            .map_err(|e| RepositoryError::new(context.to_owned(), "Filename field", e))?
            .to_owned();
        let (source_name, source_version) = match bin.source() {
            Some(raw) => {
                let (source_name, source_version) = parse_source_field(raw);
                (source_name, source_version.unwrap_or_else(|| version.clone()))
            }
            None => (name.clone(), version.clone()),
        };

        out.push(BinaryPackage {
            name: name.clone().into(),
            version,
            architecture: arch.to_owned(),
            component: component.to_owned(),
            source_name: source_name.into(),
            source_version,
            file: FileRef::new(basename(&filename)?, locate(&filename)),
            is_installer,
        });
    }

    Ok(out)
}

async fn scan_sources(
    release: &dyn ReleaseReader,
    context: &str,
    component: &str,
    locate: impl Fn(&str) -> FileLocator,
) -> Result<Vec<SourcePackage>, RepositoryError> {
    let entry = release
        .sources_entry(component)
        .map_err(|e| RepositoryError::new(context.to_owned(), "sources_entry", e))?;

    let mut reader = entry_reader(release, &entry, context).await?;
    let mut out = Vec::new();

    while let Some(paragraph) = reader
        .read_paragraph()
        .await
        .map_err(|e| RepositoryError::new(context.to_owned(), "read Sources paragraph", e))?
    {
        let source = DebianSourceControlFile::from(paragraph);
        let name = source
            .source()
            .or_else(|_| source.required_field_str("Package"))
            .map_err(|e| RepositoryError::new(context.to_owned(), "Source/Package field", e))?
            .to_owned();
        let version = source
            .required_field_str("Version")
            .map_err(|e| RepositoryError::new(context.to_owned(), "Version field", e))?
            .to_owned();
        let directory = source
            .required_field_str("Directory")
            .map_err(|e| RepositoryError::new(context.to_owned(), "Directory field", e))?
            .to_owned();

        let mut files = Vec::new();
        let entries = source
            .files()
            .map_err(|e| RepositoryError::new(context.to_owned(), "Files field", e))?;
        for file in entries {
            let file = file.map_err(|e| RepositoryError::new(context.to_owned(), "Files entry", e))?;
            let path = format!("{directory}/{}", file.filename);
            files.push(FileRef::new(file.filename.clone(), locate(&path)));
        }

        if !files.iter().any(FileRef::is_dsc) {
            warn!(package = name, "source has no .dsc entry, skipping");
            continue;
        }

        out.push(SourcePackage {
            name: name.into(),
            version,
            component: component.to_owned(),
            files,
            binaries: Vec::new(),
        });
    }

    Ok(out)
}

/// Parses a binary package's `Source` field: `name` or `name (version)`.
fn parse_source_field(raw: &str) -> (String, Option<String>) {
    match raw.find('(') {
        Some(idx) => {
            let name = raw[..idx].trim().to_owned();
            let version = raw[idx + 1..].trim_end_matches(')').trim().to_owned();
            (name, Some(version))
        }
        None => (raw.trim().to_owned(), None),
    }
}

fn basename(path: &str) -> Result<&str, RepositoryError> {
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            RepositoryError::new(path.to_owned(), "basename", ScanError(format!("bad filename {path}")))
        })
}

/// Reads a Debian-style archive rooted at a local directory.
pub struct FilesystemRepositoryFacade {
    root: PathBuf,
    dist: String,
}

impl FilesystemRepositoryFacade {
    pub fn new(root: impl Into<PathBuf>, dist: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            dist: dist.into(),
        }
    }

    async fn release_reader(&self) -> Result<Box<dyn ReleaseReader>, RepositoryError> {
        let root = FilesystemRepositoryReader::new(&self.root);
        let mut release = root
            .release_reader(&self.dist)
            .await
            .map_err(|e| RepositoryError::new(self.base_location_string(), "release_reader", e))?;
        release.set_preferred_compression(Compression::None);
        Ok(release)
    }

    fn base_location_string(&self) -> String {
        format!("{}#{}", self.root.display(), self.dist)
    }

    fn locate(&self, relative: &str) -> FileLocator {
        FileLocator::Path(self.root.join(relative))
    }
}

#[async_trait]
impl RepositoryFacade for FilesystemRepositoryFacade {
    async fn source_packages(
        &self,
        _suite: &str,
        component: &str,
    ) -> Result<Vec<SourcePackage>, RepositoryError> {
        let release = self.release_reader().await?;
        scan_sources(&*release, &self.base_location_string(), component, |p| self.locate(p)).await
    }

    async fn binary_packages(
        &self,
        _suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError> {
        let release = self.release_reader().await?;
        scan_binaries(
            &*release,
            &self.base_location_string(),
            component,
            arch,
            false,
            |p| self.locate(p),
        )
        .await
    }

    async fn installer_packages(
        &self,
        _suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError> {
        let release = self.release_reader().await?;
        scan_binaries(
            &*release,
            &self.base_location_string(),
            component,
            arch,
            true,
            |p| self.locate(p),
        )
        .await
    }

    async fn materialize(&self, file: &FileRef) -> Result<PathBuf, RepositoryError> {
        match &file.locator {
            FileLocator::Path(path) => Ok(path.clone()),
            FileLocator::Url(url) => Err(RepositoryError::new(
                self.base_location_string(),
                "materialize",
                ScanError(format!("filesystem repository cannot resolve URL {url}")),
            )),
        }
    }

    fn base_location(&self) -> &str {
        self.root.to_str().unwrap_or("<non-utf8 path>")
    }
}

/// Reads a Debian-style archive served over HTTP, downloading files into
/// `cache_dir` on `materialize`, retrying transient failures.
pub struct HttpRepositoryFacade {
    client: Client,
    root_url: Url,
    dist: String,
    cache_dir: PathBuf,
}

impl HttpRepositoryFacade {
    pub fn new(root_url: Url, dist: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::default(),
            root_url,
            dist: dist.into(),
            cache_dir: cache_dir.into(),
        }
    }

    async fn release_reader(&self) -> Result<Box<dyn ReleaseReader>, RepositoryError> {
        let root = HttpRepositoryClient::new_client(self.client.clone(), self.root_url.clone())
            .map_err(|e| RepositoryError::new(self.root_url.to_string(), "new HttpRepositoryClient", e))?;
        let mut release = root
            .release_reader(&self.dist)
            .await
            .map_err(|e| RepositoryError::new(self.root_url.to_string(), "release_reader", e))?;
        release.set_preferred_compression(Compression::Xz);
        Ok(release)
    }

    fn locate(&self, relative: &str) -> FileLocator {
        match self.root_url.join(relative) {
            Ok(url) => FileLocator::Url(url),
            Err(_) => FileLocator::Url(self.root_url.clone()),
        }
    }
}

fn is_reqwest_error_retriable(e: &reqwest::Error) -> bool {
    !e.status().is_some_and(|s| s.is_client_error())
}

#[derive(Debug, thiserror::Error)]
enum DownloadError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ScanError(String);

#[async_trait]
impl RepositoryFacade for HttpRepositoryFacade {
    async fn source_packages(
        &self,
        _suite: &str,
        component: &str,
    ) -> Result<Vec<SourcePackage>, RepositoryError> {
        let release = self.release_reader().await?;
        scan_sources(&*release, self.root_url.as_str(), component, |p| self.locate(p)).await
    }

    async fn binary_packages(
        &self,
        _suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError> {
        let release = self.release_reader().await?;
        scan_binaries(&*release, self.root_url.as_str(), component, arch, false, |p| {
            self.locate(p)
        })
        .await
    }

    async fn installer_packages(
        &self,
        _suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackage>, RepositoryError> {
        let release = self.release_reader().await?;
        scan_binaries(&*release, self.root_url.as_str(), component, arch, true, |p| {
            self.locate(p)
        })
        .await
    }

    #[tracing::instrument(skip(self, file), fields(filename = %file.filename))]
    async fn materialize(&self, file: &FileRef) -> Result<PathBuf, RepositoryError> {
        let url = match &file.locator {
            FileLocator::Url(url) => url.clone(),
            FileLocator::Path(path) => {
                return Ok(path.clone());
            }
        };

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| RepositoryError::new(self.root_url.to_string(), "create cache dir", e))?;
        let dest_path = self.cache_dir.join(&file.filename);

        backoff::future::retry(ExponentialBackoff::default(), || async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| {
                    if is_reqwest_error_retriable(&e) {
                        warn!("failed to download {url}: {e}");
                        BackoffError::transient(DownloadError::from(e))
                    } else {
                        BackoffError::permanent(DownloadError::from(e))
                    }
                })?;

            let bytes = response.bytes().await.map_err(|e| {
                warn!("failed to read {url}: {e}");
                BackoffError::transient(DownloadError::from(e))
            })?;

            let mut dest = tokio::fs::File::create(&dest_path)
                .await
                .map_err(|e| BackoffError::permanent(DownloadError::from(e)))?;
            dest.write_all(&bytes)
                .await
                .map_err(|e| BackoffError::permanent(DownloadError::from(e)))?;

            Ok::<_, BackoffError<DownloadError>>(())
        })
        .await
        .map_err(|e| RepositoryError::new(self.root_url.to_string(), "download", e))?;

        Ok(dest_path)
    }

    fn base_location(&self) -> &str {
        self.root_url.as_str()
    }
}
