//! Process settings.
//!
//! Layers, lowest first:
//! - built-in per-daemon defaults
//! - YAML file named by `HADOOP_EXPORTER_CONFIG` (optional)
//! - environment / `.env` and command-line flags (handled by clap in `main`)

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::daemon::DaemonKind;
use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "HADOOP_EXPORTER_CONFIG";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

const RESERVED_PATHS: [&str; 3] = ["/", "/health", "/status"];

/// One partial layer. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsLayer {
    pub listen_address: Option<String>,
    pub metrics_path: Option<String>,
    pub site_path: Option<PathBuf>,
    pub timeout_seconds: Option<u64>,
}

impl SettingsLayer {
    /// Read the file named by `HADOOP_EXPORTER_CONFIG`, if any.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// A missing file falls back to defaults; a broken one is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|source| ConfigError::SettingsFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `self` overridden by every field set in `over`.
    pub fn merge(self, over: SettingsLayer) -> SettingsLayer {
        SettingsLayer {
            listen_address: over.listen_address.or(self.listen_address),
            metrics_path: over.metrics_path.or(self.metrics_path),
            site_path: over.site_path.or(self.site_path),
            timeout_seconds: over.timeout_seconds.or(self.timeout_seconds),
        }
    }
}

/// Fully resolved, immutable settings handed to the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub daemon: DaemonKind,
    pub listen_address: SocketAddr,
    pub metrics_path: String,
    pub site_path: PathBuf,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(daemon: DaemonKind, layer: SettingsLayer) -> Result<Self, ConfigError> {
        let listen_address = parse_listen_address(
            layer
                .listen_address
                .as_deref()
                .unwrap_or(daemon.default_listen_address()),
        )?;

        let metrics_path = layer.metrics_path.unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string());
        if !metrics_path.starts_with('/') || RESERVED_PATHS.contains(&metrics_path.as_str()) {
            return Err(ConfigError::InvalidSetting(format!(
                "metrics path '{metrics_path}' must start with '/' and differ from {}",
                RESERVED_PATHS.join(", ")
            )));
        }

        let timeout_seconds = layer.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            return Err(ConfigError::InvalidSetting("request timeout must be at least 1 second".into()));
        }

        Ok(Self {
            daemon,
            listen_address,
            metrics_path,
            site_path: layer
                .site_path
                .unwrap_or_else(|| PathBuf::from(daemon.default_site_path())),
            timeout: Duration::from_secs(timeout_seconds),
        })
    }
}

/// Accepts `ip:port`, `hostname:port` (resolved once, IPv4 preferred) and the
/// bare `:port` form, which binds all interfaces.
pub fn parse_listen_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    let candidate = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => value.to_string(),
    };
    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let invalid = || ConfigError::InvalidSetting(format!("listen address '{value}' is not host:port"));
    let addrs: Vec<SocketAddr> = candidate.to_socket_addrs().map_err(|_| invalid())?.collect();
    addrs
        .iter()
        .copied()
        .find(SocketAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
        .ok_or_else(invalid)
}
