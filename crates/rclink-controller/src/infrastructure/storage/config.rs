//! TOML configuration for the `rclink` controller.
//!
//! Looked up in the platform-appropriate location unless `--config` points
//! somewhere else:
//! - Linux:    `$XDG_CONFIG_HOME/rclink/config.toml` (or `~/.config/rclink/`)
//! - Windows:  `%APPDATA%\RcLink\config.toml`
//! - macOS:    `~/Library/Application Support/RcLink/config.toml`
//!
//! Every section and every key is optional:
//!
//! ```toml
//! [peer]
//! transport = "serial"
//! address = "/dev/rfcomm0"
//! name = "HC-05"
//!
//! [link]
//! reconnect_delay_ms = 5000
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take `some_fn()`
//! when absent, so a first run without any file and a file written by an
//! older version both load cleanly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use rclink_core::{PeerHandle, Speed};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::link_manager::LinkConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub peer: PeerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Link timing and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSettings {
    /// Liveness probe interval while connected.
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
    /// Wait before each automatic reconnection attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Automatic retries before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u8,
    /// Minimum spacing of directional commands.
    #[serde(default = "default_command_interval_ms")]
    pub command_interval_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Control session defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlSettings {
    /// Speed the session starts with, `0..=255`.
    #[serde(default = "default_speed")]
    pub default_speed: u8,
    /// Capture device claimed by webcam mode, e.g. `/dev/video0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webcam_device: Option<PathBuf>,
}

/// Which transport opens the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// `host:port` over TCP.
    #[default]
    Tcp,
    /// A serial device path such as `/dev/rfcomm0`.
    Serial,
}

/// The receiver to drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerSettings {
    #[serde(default)]
    pub transport: TransportKind,
    /// Transport-specific address; no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Display name used in status lines.
    #[serde(default = "default_peer_name")]
    pub name: String,
    /// Serial baud rate; ignored for TCP.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// `tracing` level filter: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_health_interval_ms() -> u64 {
    2000
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_max_reconnect_attempts() -> u8 {
    3
}
fn default_command_interval_ms() -> u64 {
    100
}
fn default_write_timeout_ms() -> u64 {
    1000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_speed() -> u8 {
    Speed::DEFAULT.value()
}
fn default_peer_name() -> String {
    "vehicle".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            health_interval_ms: default_health_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            command_interval_ms: default_command_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            default_speed: default_speed(),
            webcam_device: None,
        }
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            address: None,
            name: default_peer_name(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl From<&LinkSettings> for LinkConfig {
    fn from(settings: &LinkSettings) -> Self {
        Self {
            health_interval: Duration::from_millis(settings.health_interval_ms),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            command_interval: Duration::from_millis(settings.command_interval_ms),
            write_timeout: Duration::from_millis(settings.write_timeout_ms),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
        }
    }
}

impl PeerSettings {
    /// The configured peer, if an address is set.
    pub fn handle(&self) -> Option<PeerHandle> {
        self.address
            .as_ref()
            .map(|address| PeerHandle::new(address.clone(), self.name.clone()))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory, including the `rclink` leaf.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RcLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rclink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RcLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rclink_config_test_{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults_match_documented_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.link.health_interval_ms, 2000);
        assert_eq!(cfg.link.reconnect_delay_ms, 3000);
        assert_eq!(cfg.link.max_reconnect_attempts, 3);
        assert_eq!(cfg.link.command_interval_ms, 100);
        assert_eq!(cfg.control.default_speed, 128);
        assert_eq!(cfg.peer.transport, TransportKind::Tcp);
        assert_eq!(cfg.peer.baud_rate, 9600);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_empty_file_loads_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        // Arrange
        let text = r#"
            [peer]
            transport = "serial"
            address = "/dev/rfcomm0"

            [link]
            reconnect_delay_ms = 5000
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.peer.transport, TransportKind::Serial);
        assert_eq!(cfg.peer.name, "vehicle");
        assert_eq!(cfg.link.reconnect_delay_ms, 5000);
        assert_eq!(cfg.link.health_interval_ms, 2000);
    }

    #[test]
    fn test_unknown_transport_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[peer]\ntransport = \"carrier-pigeon\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_link_settings_convert_to_link_config() {
        let settings = LinkSettings {
            health_interval_ms: 500,
            ..LinkSettings::default()
        };

        let config = LinkConfig::from(&settings);

        assert_eq!(config.health_interval, Duration::from_millis(500));
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_peer_handle_requires_an_address() {
        let mut peer = PeerSettings::default();
        assert!(peer.handle().is_none());

        peer.address = Some("192.168.4.1:8080".to_string());
        let handle = peer.handle().unwrap();
        assert_eq!(handle.address(), "192.168.4.1:8080");
        assert_eq!(handle.name(), "vehicle");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = load_config_from(&scratch_path("absent.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_saved_config_loads_back() {
        // Arrange
        let path = scratch_path("config.toml");
        let mut cfg = AppConfig::default();
        cfg.peer.address = Some("/dev/rfcomm1".to_string());
        cfg.control.default_speed = 200;

        // Act
        save_config_to(&cfg, &path).unwrap();
        let restored = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(restored, cfg);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
