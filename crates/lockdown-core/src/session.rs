//! Session types for exam session management.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settings::Settings;

/// Unique identifier for an exam session.
///
/// Used to correlate service-side session start/stop with the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A password value together with its representation.
///
/// `is_hash` states whether the value is already a one-way hash (supplied by
/// a previous session) or raw operator input that must be hashed before
/// comparison. A hashed value is never hashed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordParameters {
    /// The password value (raw or hashed, see `is_hash`)
    pub password: String,
    /// Whether `password` already is a one-way hash
    pub is_hash: bool,
}

impl PasswordParameters {
    /// Wrap raw operator input.
    pub fn raw(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            is_hash: false,
        }
    }

    /// Wrap an already-hashed value.
    pub fn hashed(hash: impl Into<String>) -> Self {
        Self {
            password: hash.into(),
            is_hash: true,
        }
    }
}

/// Generated identifiers and addresses for one session.
///
/// Regenerated every time a new pending session is created - identifiers are
/// never reused across sessions, since stale identifiers are the basis of
/// replay/confusion attacks on the IPC layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identifier of the client process instance
    pub client_id: Uuid,
    /// Identifier of the runtime process instance
    pub runtime_id: Uuid,
    /// Identifier of the service session
    pub service_id: Uuid,
    /// IPC endpoint address the client binds
    pub client_address: String,
    /// IPC endpoint address the runtime binds
    pub runtime_address: String,
    /// Log file path for the client process
    pub client_log_path: PathBuf,
    /// Log file path for the runtime process
    pub runtime_log_path: PathBuf,
    /// Random per-session authentication token
    pub authentication_token: Uuid,
}

impl AppConfig {
    /// Generate a fresh configuration with random identifiers.
    ///
    /// `log_dir` is where the per-process log files are placed.
    pub fn generate(log_dir: &std::path::Path) -> Self {
        let client_id = Uuid::new_v4();
        let runtime_id = Uuid::new_v4();
        Self {
            client_id,
            runtime_id,
            service_id: Uuid::new_v4(),
            client_address: format!("lockdown-client-{client_id}"),
            runtime_address: format!("lockdown-runtime-{runtime_id}"),
            client_log_path: log_dir.join("client.log"),
            runtime_log_path: log_dir.join("runtime.log"),
            authentication_token: Uuid::new_v4(),
        }
    }
}

/// The complete configuration of one session.
///
/// Built up incrementally while pending (`Next`), then treated as immutable
/// once promoted to the active session (`Current`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfiguration {
    /// Correlates service-side session start/stop
    pub session_id: SessionId,
    /// Generated identifiers and addresses
    pub app_config: AppConfig,
    /// The user-facing settings tree
    pub settings: Settings,
    /// Set when the configuration source was a login page rather than a
    /// settings document
    pub is_browser_resource: bool,
    /// Browser exam key received from the exam server (server mode only)
    pub browser_exam_key: Option<String>,
    /// When this configuration was created
    pub created_at: DateTime<Utc>,
}

impl SessionConfiguration {
    /// Create a fresh session configuration around the given settings.
    ///
    /// A new session id, app config and authentication token are generated.
    pub fn new(settings: Settings, log_dir: &std::path::Path) -> Self {
        Self {
            session_id: SessionId::new(),
            app_config: AppConfig::generate(log_dir),
            settings,
            is_browser_resource: false,
            browser_exam_key: None,
            created_at: Utc::now(),
        }
    }
}
