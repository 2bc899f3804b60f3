//! Configuration of the runtime process itself.
//!
//! Not to be confused with [`crate::Settings`], which configures a session.
//! [`RuntimeConfig`] holds the knobs of the orchestration machinery: bounded
//! wait timeouts, retry limits and well-known settings file locations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime process configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bounded wait timeouts
    pub timeouts: TimeoutSettings,
    /// Retry and attempt limits
    pub limits: LimitSettings,
    /// Well-known file locations
    pub paths: PathSettings,
}

impl RuntimeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeouts.service_ms == 0 || self.timeouts.client_ms == 0 {
            return Err(crate::Error::Config(
                "timeouts must be > 0".to_string(),
            ));
        }

        if self.limits.kill_attempts == 0 {
            return Err(crate::Error::Config(
                "limits.kill_attempts must be > 0".to_string(),
            ));
        }

        if self.limits.password_attempts == 0 {
            return Err(crate::Error::Config(
                "limits.password_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Bounded wait timeouts in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Wait on the service's lockdown-applied signal
    pub service_ms: u64,
    /// Overall wait for the client to become ready / shut down
    pub client_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            service_ms: 10_000,
            client_ms: 30_000,
        }
    }
}

/// Retry and attempt limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Kill attempts before giving up on a surviving client process
    pub kill_attempts: u32,
    /// Pause between kill attempts in milliseconds
    pub kill_retry_pause_ms: u64,
    /// Password prompts before a gated flow aborts
    pub password_attempts: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            kill_attempts: 5,
            kill_retry_pause_ms: 500,
            password_attempts: 5,
        }
    }
}

/// Well-known file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Machine-wide settings file
    pub machine_settings: PathBuf,
    /// Per-user settings file
    pub user_settings: PathBuf,
    /// Directory for per-session log files
    pub log_dir: PathBuf,
    /// Client executable (None = no client deployed on this machine)
    pub client_path: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            machine_settings: PathBuf::from("/etc/lockdown/settings.yaml"),
            user_settings: PathBuf::from("settings.yaml"),
            log_dir: PathBuf::from("logs"),
            client_path: None,
        }
    }
}
