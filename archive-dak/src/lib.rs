//! Concrete [`DakFacade`] implementation: uploads already-materialized files
//! to a staging directory over HTTP and then asks the remote archive tool to
//! import them into `(suite, component)`.

use std::path::Path;

use backoff::{Error as BackoffError, ExponentialBackoff};
use reqwest::{multipart, Client, StatusCode};
use serde::Serialize;
use sync_engine::dak::{DakError, DakFacade};
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::warn;
use url::Url;

fn is_reqwest_error_retriable(e: &reqwest::Error) -> bool {
    !e.status().is_some_and(StatusCode::is_client_error)
}

#[derive(Debug, thiserror::Error)]
enum DakClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ImportRequest<'a> {
    suite: &'a str,
    component: &'a str,
    files: Vec<String>,
    trusted: bool,
    allow_new: bool,
}

#[derive(serde::Deserialize)]
struct ImportResponse {
    accepted: bool,
    #[serde(default)]
    message: String,
}

/// Talks to a remote archive-management service: `PUT`s each materialized
/// file into a per-run staging directory, then `POST`s an import request
/// naming the uploaded filenames.
pub struct DakRestFacade {
    client: Client,
    base_url: Url,
    staging_dir: String,
}

impl DakRestFacade {
    pub fn new(base_url: Url, staging_dir: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            staging_dir: staging_dir.into(),
        }
    }

    fn staging_url(&self, filename: &str) -> Url {
        self.base_url
            .join(&format!("files/{}/{filename}", self.staging_dir))
            .unwrap_or_else(|_| self.base_url.clone())
    }

    fn import_url(&self) -> Url {
        self.base_url
            .join("import")
            .unwrap_or_else(|_| self.base_url.clone())
    }

    async fn upload_one(&self, path: &Path) -> Result<String, DakClientError> {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| {
                DakClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("path {} has no filename", path.display()),
                ))
            })?
            .to_owned();

        backoff::future::retry(ExponentialBackoff::default(), || async {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| BackoffError::permanent(DakClientError::from(e)))?;
            let body = reqwest::Body::wrap_stream(FramedRead::new(file, BytesCodec::new()));
            let form = multipart::Form::new().part("file", multipart::Part::stream(body).file_name(filename.clone()));

            self.client
                .post(self.staging_url(&filename))
                .multipart(form)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map(|_| ())
                .map_err(|e| {
                    if is_reqwest_error_retriable(&e) {
                        warn!(%filename, "upload failed, retrying: {e}");
                        BackoffError::transient(DakClientError::from(e))
                    } else {
                        BackoffError::permanent(DakClientError::from(e))
                    }
                })
        })
        .await?;

        Ok(filename)
    }
}

#[async_trait::async_trait]
impl DakFacade for DakRestFacade {
    async fn import_files(
        &self,
        suite: &str,
        component: &str,
        local_paths: &[&Path],
        trusted: bool,
        allow_new: bool,
    ) -> Result<bool, DakError> {
        let mut files = Vec::with_capacity(local_paths.len());
        for path in local_paths {
            let filename = self
                .upload_one(path)
                .await
                .map_err(|e| DakError::new(suite, component, e))?;
            files.push(filename);
        }

        let request = ImportRequest {
            suite,
            component,
            files,
            trusted,
            allow_new,
        };

        let response: ImportResponse = backoff::future::retry(ExponentialBackoff::default(), || async {
            self.client
                .post(self.import_url())
                .json(&request)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| {
                    if is_reqwest_error_retriable(&e) {
                        warn!(suite, component, "import request failed, retrying: {e}");
                        BackoffError::transient(DakClientError::from(e))
                    } else {
                        BackoffError::permanent(DakClientError::from(e))
                    }
                })
        })
        .await
        .map_err(|e| DakError::new(suite, component, e))?
        .json()
        .await
        .map_err(|e| DakError::new(suite, component, DakClientError::from(e)))?;

        if !response.accepted {
            warn!(suite, component, message = %response.message, "dak rejected import");
        }

        Ok(response.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_url_joins_directory_and_filename() {
        let facade = DakRestFacade::new(Url::parse("http://localhost:9000/").unwrap(), "run-1".into());
        assert_eq!(
            facade.staging_url("foo_1.0-1.dsc").as_str(),
            "http://localhost:9000/files/run-1/foo_1.0-1.dsc"
        );
    }

    #[test]
    fn import_url_is_relative_to_base() {
        let facade = DakRestFacade::new(Url::parse("http://localhost:9000/").unwrap(), "run-1".into());
        assert_eq!(facade.import_url().as_str(), "http://localhost:9000/import");
    }
}
