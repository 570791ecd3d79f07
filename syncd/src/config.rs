//! On-disk configuration for `syncd`.
//!
//! The shape (nested `Suite`, lists of keyrings) is too rich for flat CLI
//! flags, so it lives in a TOML file instead and only a couple of booleans
//! get environment-variable overrides on top.

use std::path::PathBuf;

use serde::Deserialize;
use sync_engine::EngineConfig;
use url::Url;

/// The full on-disk shape: the engine's own immutable config plus the
/// parameters `syncd` needs to construct the concrete facades the engine is
/// generic over.
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,

    /// Root of the target archive's local filesystem mirror.
    pub archive_root_path: PathBuf,
    /// Identifies this project to the Dak facade's staging directories.
    pub project_name: String,
    /// Base URL of the Dak REST endpoint.
    pub dak_api_url: Url,
    /// Local cache directory for materialized source-archive downloads.
    pub cache_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads `FileConfig` from `path` and overlays `SYNC_ENABLED`/`SYNC_BINARIES`
/// environment variable overrides, when present, on top of the file's
/// values.
pub fn load(path: &std::path::Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    let mut config: FileConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })?;

    if let Some(value) = bool_env_override("SYNC_ENABLED") {
        config.engine.sync_enabled = value;
    }
    if let Some(value) = bool_env_override("SYNC_BINARIES") {
        config.engine.sync_binaries = value;
    }

    Ok(config)
}

fn bool_env_override(name: &str) -> Option<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            other => {
                tracing::warn!(name, value = other, "ignoring unparseable boolean override");
                None
            }
        },
        Err(_) => None,
    }
}
