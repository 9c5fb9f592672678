use std::fs::read_to_string;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::from_str;
use thiserror::Error;
use tracing::trace;

use crate::chan::policy::{BoardPolicy, DEFAULT_DENIED_BOARDS};

/// Name of the configuration file looked up when `--config` is not given.
pub(crate) const CONFIG_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub(crate) type ConfigResult<T> = Result<T, ConfigError>;

/// Settings shared by every step of a run. Every key is optional.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    /// Root under which `{board}/{slug}` directories are created.
    #[serde(rename = "downloadDirectory", default = "default_download_directory")]
    download_directory: PathBuf,
    /// Directory receiving one log file per run.
    #[serde(rename = "logDirectory", default = "default_log_directory")]
    log_directory: PathBuf,
    /// Level filter for the log file (e.g "info", "debug").
    #[serde(rename = "logLevel", default = "default_log_level")]
    log_level: String,
    /// Base URL attachments are fetched from.
    #[serde(rename = "mediaHost", default = "default_media_host")]
    media_host: String,
    #[serde(rename = "userAgent", default = "default_user_agent")]
    user_agent: String,
    /// Board codes that are refused before any download work.
    #[serde(rename = "deniedBoards", default = "default_denied_boards")]
    denied_boards: Vec<String>,
}

fn default_download_directory() -> PathBuf { PathBuf::from("downloads") }
fn default_log_directory() -> PathBuf { PathBuf::from("logs") }
fn default_log_level() -> String { String::from("debug") }
fn default_media_host() -> String { String::from("https://i.4cdn.org") }
fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
fn default_denied_boards() -> Vec<String> {
    DEFAULT_DENIED_BOARDS.iter().map(|b| b.to_string()).collect()
}

impl Config {
    /// Loads the config at `path`, falling back to defaults when the file does not exist.
    pub(crate) fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            trace!("{}: does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if let Err(e) = url::Url::parse(&self.media_host) {
            return Err(ConfigError::Invalid {
                key: "mediaHost",
                reason: e.to_string(),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "logLevel",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub(crate) fn download_directory(&self) -> &Path {
        &self.download_directory
    }

    pub(crate) fn set_download_directory(&mut self, dir: PathBuf) {
        self.download_directory = dir;
    }

    pub(crate) fn log_directory(&self) -> &Path {
        &self.log_directory
    }

    pub(crate) fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Base URL for attachments, without a trailing slash.
    pub(crate) fn media_host(&self) -> &str {
        self.media_host.trim_end_matches('/')
    }

    #[cfg(test)]
    pub(crate) fn set_media_host(&mut self, host: impl Into<String>) {
        self.media_host = host.into();
    }

    #[cfg(test)]
    pub(crate) fn set_log_directory(&mut self, dir: PathBuf) {
        self.log_directory = dir;
    }

    pub(crate) fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub(crate) fn board_policy(&self) -> BoardPolicy {
        BoardPolicy::new(self.denied_boards.iter().cloned())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            download_directory: default_download_directory(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            media_host: default_media_host(),
            user_agent: default_user_agent(),
            denied_boards: default_denied_boards(),
        }
    }
}
