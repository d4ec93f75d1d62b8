//! Configuration file management
//!
//! Loads an optional TOML file with device candidates, service file
//! locations and the holding policies. Command-line options override it.
//! Default config path: ~/.config/crtmode/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DEVICE_PATHS, DEFAULT_MARGINS_FILE, DEFAULT_NORM_FILE, DEFAULT_PID_FILE,
    DEFAULT_POLL_INTERVAL_MS,
};
use crate::service::{MasterPolicy, ReloadPolicy};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DRM device settings
    pub device: DeviceConfig,
    /// Holding service settings
    pub service: ServiceConfig,
}

/// DRM device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device nodes tried in order; the first that opens wins
    pub paths: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            paths: DEFAULT_DEVICE_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Holding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Main loop wake interval in milliseconds
    pub poll_interval_ms: u64,
    /// PID record written once the service is running
    pub pid_file: String,
    /// Norm parameter file, re-read on SIGUSR1
    pub norm_file: String,
    /// Margins parameter file, re-read on SIGUSR2
    pub margins_file: String,
    /// "hold" keeps DRM master for the process lifetime,
    /// "yield" drops it right after the mode is set
    pub master: MasterPolicy,
    /// "reloadable" services SIGUSR1/SIGUSR2, "static" ignores them
    pub reload: ReloadPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            pid_file: DEFAULT_PID_FILE.to_string(),
            norm_file: DEFAULT_NORM_FILE.to_string(),
            margins_file: DEFAULT_MARGINS_FILE.to_string(),
            master: MasterPolicy::Hold,
            reload: ReloadPolicy::Reloadable,
        }
    }
}

impl ServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the loop
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/crtmode/config.toml";

    /// First existing config file: `$CRTMODE_CONFIG`, the user config
    /// directory, then `/etc`. `None` means built-in defaults.
    pub fn config_path() -> Option<PathBuf> {
        let env = std::env::var_os("CRTMODE_CONFIG").map(PathBuf::from);
        let user = dirs::config_dir().map(|dir| dir.join("crtmode").join("config.toml"));
        let system = Some(PathBuf::from(Self::SYSTEM_CONFIG_PATH));

        [env, user, system]
            .into_iter()
            .flatten()
            .find(|path| path.exists())
    }

    /// Load the discovered config; unreadable or invalid files fall back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from_file(&path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from specified path
    fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
