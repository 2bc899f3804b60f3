//! Settings repository - loading, decryption status and client write-back.
//!
//! The on-disk representation is an envelope around the settings tree. The
//! orchestration core never looks inside; it only consumes the
//! [`LoadStatus`] taxonomy this module produces.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use lockdown_core::{
    Error, LoadStatus, PasswordParameters, Result, SaveStatus, SessionConfiguration, Settings,
};

/// Outcome of a settings load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Load status per the decryption protocol
    pub status: LoadStatus,
    /// The loaded settings, present only on `Success`
    pub settings: Option<Settings>,
}

impl LoadOutcome {
    fn status(status: LoadStatus) -> Self {
        Self {
            status,
            settings: None,
        }
    }
}

/// Repository the configuration resolution operation drives.
pub trait SettingsRepository: Send + Sync {
    /// Try to load the settings resource at `uri`.
    fn try_load_settings(
        &self,
        uri: &str,
        password: Option<&PasswordParameters>,
    ) -> Result<LoadOutcome>;

    /// Persist the settings resource at `uri` as this machine's client
    /// configuration, gated on the current machine's administrator password.
    fn configure_client_with(
        &self,
        uri: &str,
        password: &PasswordParameters,
    ) -> Result<SaveStatus>;

    /// Create a fresh session configuration with generated identifiers.
    fn initialize_session_configuration(&self) -> SessionConfiguration;

    /// The built-in default settings.
    fn load_default_settings(&self) -> Settings;
}

/// On-disk envelope around a settings tree.
///
/// `password_hash` protects the resource; `browser_resource` marks a
/// resource that is an interactive login page rather than settings data.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct SettingsEnvelope {
    password_hash: Option<String>,
    browser_resource: bool,
    format_version: u32,
    settings: Option<Settings>,
}

/// Highest envelope format this build can read.
const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// File-backed settings repository.
#[derive(Debug, Clone)]
pub struct FileSettingsRepository {
    machine_path: PathBuf,
    log_dir: PathBuf,
}

impl FileSettingsRepository {
    /// Create a repository writing client configurations to `machine_path`.
    pub fn new(machine_path: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            machine_path: machine_path.into(),
            log_dir: log_dir.into(),
        }
    }

    /// The machine-wide settings file this repository writes to.
    pub fn machine_path(&self) -> &Path {
        &self.machine_path
    }

    fn read_envelope(&self, uri: &str) -> Result<std::result::Result<SettingsEnvelope, LoadStatus>> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            // Remote resources need a transport this repository does not carry
            return Ok(Err(LoadStatus::NotSupported));
        }

        let path = uri.strip_prefix("file://").unwrap_or(uri);
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::SettingsLoad(format!("{path}: {e}"))
        })?;

        match serde_yaml::from_str::<SettingsEnvelope>(&content) {
            Ok(envelope) => Ok(Ok(envelope)),
            Err(e) => {
                warn!("Settings resource '{}' is not parseable: {}", uri, e);
                Ok(Err(LoadStatus::InvalidData))
            }
        }
    }
}

impl SettingsRepository for FileSettingsRepository {
    fn try_load_settings(
        &self,
        uri: &str,
        password: Option<&PasswordParameters>,
    ) -> Result<LoadOutcome> {
        debug!("Loading settings resource: uri='{}'", uri);

        let envelope = match self.read_envelope(uri)? {
            Ok(envelope) => envelope,
            Err(status) => return Ok(LoadOutcome::status(status)),
        };

        if envelope.format_version > SUPPORTED_FORMAT_VERSION {
            return Ok(LoadOutcome::status(LoadStatus::NotSupported));
        }

        if envelope.browser_resource {
            info!("Settings resource '{}' is a browser resource", uri);
            return Ok(LoadOutcome::status(LoadStatus::LoadWithBrowser));
        }

        if let Some(expected) = &envelope.password_hash {
            let supplied = match password {
                Some(parameters) => hash_candidate(parameters),
                None => return Ok(LoadOutcome::status(LoadStatus::PasswordNeeded)),
            };
            if &supplied != expected {
                debug!("Password mismatch for settings resource '{}'", uri);
                return Ok(LoadOutcome::status(LoadStatus::PasswordNeeded));
            }
        }

        match envelope.settings {
            Some(settings) => Ok(LoadOutcome {
                status: LoadStatus::Success,
                settings: Some(settings),
            }),
            None => Ok(LoadOutcome::status(LoadStatus::InvalidData)),
        }
    }

    fn configure_client_with(
        &self,
        uri: &str,
        password: &PasswordParameters,
    ) -> Result<SaveStatus> {
        info!("Configuring client from '{}'", uri);

        // Authenticate against the current machine configuration, if any
        if self.machine_path.exists() {
            if let Ok(Ok(current)) = self.read_envelope(&self.machine_path.to_string_lossy()) {
                let current_hash = current
                    .settings
                    .as_ref()
                    .and_then(|s| s.security.admin_password_hash.clone());
                if let Some(expected) = current_hash {
                    if hash_candidate(password) != expected {
                        return Ok(SaveStatus::InvalidPassword);
                    }
                }
            }
        }

        let outcome = self.try_load_settings(uri, Some(password))?;
        let settings = match outcome.settings {
            Some(settings) => settings,
            None => {
                warn!(
                    "Cannot configure client: resource '{}' yielded {:?}",
                    uri, outcome.status
                );
                return Ok(SaveStatus::UnexpectedError);
            }
        };

        let envelope = SettingsEnvelope {
            password_hash: None,
            browser_resource: false,
            format_version: SUPPORTED_FORMAT_VERSION,
            settings: Some(settings),
        };
        let yaml = serde_yaml::to_string(&envelope)
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = self.machine_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.machine_path, yaml)?;

        info!(
            "Client configuration written to '{}'",
            self.machine_path.display()
        );
        Ok(SaveStatus::Success)
    }

    fn initialize_session_configuration(&self) -> SessionConfiguration {
        SessionConfiguration::new(self.load_default_settings(), &self.log_dir)
    }

    fn load_default_settings(&self) -> Settings {
        Settings::default()
    }
}

/// Hash a password candidate for comparison.
///
/// An already-hashed candidate passes through unchanged - a hash is never
/// re-hashed.
pub fn hash_candidate(parameters: &PasswordParameters) -> String {
    if parameters.is_hash {
        parameters.password.clone()
    } else {
        hash_password(&parameters.password)
    }
}

/// SHA-256 hash of a raw password, hex encoded.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
