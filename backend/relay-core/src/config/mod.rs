//! Relay configuration.
//!
//! Two unrelated kinds of configuration live here:
//!
//! - [`RelaySettings`] - how this process runs (bind address, HTTP timeout).
//!   Loaded from `{config_dir}/relay.json`.
//! - [`StaticConfig`] - what a foreground client tells the background context
//!   about its environment (API base URL, feature flags).

mod static_config;

pub use static_config::StaticConfig;

use crate::error::config::ConfigError;
use crate::{RELAY_DEFAULT_PORT, RELAY_HOSTNAME};

use common::ErrorLocation;

use std::net::{IpAddr, SocketAddr};
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const SETTINGS_FILE_NAME: &str = "relay.json";
const SETTINGS_VERSION: u32 = 1;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================
// SETTINGS STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// `None` disables the timeout entirely.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub host: HostSettings,

    #[serde(default)]
    pub http: HttpSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            host: HostSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    SETTINGS_VERSION
}
fn default_bind_address() -> String {
    RELAY_HOSTNAME.to_string()
}
fn default_port() -> u16 {
    RELAY_DEFAULT_PORT
}
fn default_request_timeout_secs() -> Option<u64> {
    Some(DEFAULT_REQUEST_TIMEOUT_SECS)
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RelaySettings {
    /// Load settings from {config_dir}/relay.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let settings_path = config_dir.join(SETTINGS_FILE_NAME);

        if !settings_path.exists() {
            info!(
                "Settings file not found at {}, using defaults",
                settings_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
            warn!("Failed to read settings file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: settings_path.clone(),
                source: e,
            }
        })?;

        let settings: RelaySettings = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse settings JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: settings_path.clone(),
                reason: e.to_string(),
            }
        })?;

        settings.validate()?;

        info!("Settings loaded from {}", settings_path.display());
        Ok(settings)
    }

    /// Save settings to {config_dir}/relay.json (temp file + rename).
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let settings_path = config_dir.join(SETTINGS_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", SETTINGS_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &settings_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: settings_path.clone(),
            source: e,
        })?;

        info!("Settings saved to {}", settings_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > SETTINGS_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, SETTINGS_VERSION
                ),
            });
        }

        // Loopback only
        let ip = self.bind_ip()?;
        if !ip.is_loopback() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Bind address must be loopback, got {}", ip),
            });
        }

        if self.http.request_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "request_timeout_secs must be positive (use null to disable)".to_string(),
            });
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.host.port))
    }

    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.host
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid bind address '{}': {}", self.host.bind_address, e),
            })
    }
}
