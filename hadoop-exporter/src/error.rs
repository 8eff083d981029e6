use std::path::PathBuf;

/// Startup failures. Any of these stops the process before the server binds.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed site configuration: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Malformed site configuration: {0}")]
    Structure(String),
    #[error("No usable {daemon} address (looked for {keys})")]
    MissingAddress { daemon: &'static str, keys: String },
    #[error("Invalid address '{0}', expected host:port")]
    InvalidAddress(String),
    #[error("Cannot determine local host identity: {0}")]
    LocalHost(String),
    #[error("Invalid settings file {path}: {source}")]
    SettingsFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

/// Per-cycle failures. Never fatal; they only shape the liveness gauges.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("{url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} redirected ({status}) to {}", .location.as_deref().unwrap_or("<no location>"))]
    Redirect {
        url: String,
        status: u16,
        location: Option<String>,
    },
    #[error("{url} returned undecodable JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unexpected payload shape: {0}")]
    PayloadShape(String),
}

impl ScrapeError {
    /// The endpoint did answer, only the content was unusable.
    pub fn endpoint_answered(&self) -> bool {
        matches!(
            self,
            ScrapeError::Redirect { .. } | ScrapeError::Decode { .. } | ScrapeError::PayloadShape(_)
        )
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, ScrapeError::Redirect { .. })
    }
}
