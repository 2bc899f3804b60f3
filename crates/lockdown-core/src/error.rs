//! Error types for the lockdown runtime.

use thiserror::Error;

use crate::SessionId;

/// Main error type for lockdown operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No session with the given identifier is known
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Timed out waiting for a named cross-process signal
    #[error("Timed out after {waited_ms}ms waiting for signal '{name}'")]
    SignalTimeout {
        /// Name of the signal that was waited on
        name: String,
        /// Time waited in milliseconds
        waited_ms: u64,
    },

    /// The privileged service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A proxy connection could not be established
    #[error("Proxy connection failed: {0}")]
    ProxyConnection(String),

    /// The client asserted an identity that does not match the spawned process
    #[error("Client identity mismatch: spawned pid {spawned}, reported pid {reported}")]
    ClientImpersonation {
        /// Process id of the process the runtime spawned
        spawned: u32,
        /// Process id the client reported during authentication
        reported: u32,
    },

    /// A process could not be spawned
    #[error("Process spawn failed: {0}")]
    ProcessSpawn(String),

    /// A process survived all kill attempts
    #[error("Process {pid} still alive after {attempts} kill attempts")]
    ProcessKill {
        /// Process id of the surviving process
        pid: u32,
        /// Number of kill attempts made
        attempts: u32,
    },

    /// The operator exhausted the password attempt limit
    #[error("Password attempts exhausted (limit: {0})")]
    PasswordAttemptsExhausted(u32),

    /// A settings resource could not be loaded
    #[error("Settings load failed: {0}")]
    SettingsLoad(String),

    /// Desktop creation/activation failed
    #[error("Desktop error: {0}")]
    Desktop(String),

    /// Shell control failed
    #[error("Shell control error: {0}")]
    ShellControl(String),

    /// A remote exam server call failed
    #[error("Exam server error: {0}")]
    ExamServer(String),

    /// A version string could not be parsed
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_error() {
        let session_id = SessionId::new();
        let err = Error::SessionNotFound(session_id);
        let display = err.to_string();
        assert!(display.starts_with("Session not found:"));
    }

    #[test]
    fn test_signal_timeout_error() {
        let err = Error::SignalTimeout {
            name: "service-lockdown".to_string(),
            waited_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 5000ms waiting for signal 'service-lockdown'"
        );
    }

    #[test]
    fn test_client_impersonation_error() {
        let err = Error::ClientImpersonation {
            spawned: 1234,
            reported: 5678,
        };
        assert_eq!(
            err.to_string(),
            "Client identity mismatch: spawned pid 1234, reported pid 5678"
        );
    }

    #[test]
    fn test_process_kill_error() {
        let err = Error::ProcessKill {
            pid: 4242,
            attempts: 5,
        };
        assert_eq!(
            err.to_string(),
            "Process 4242 still alive after 5 kill attempts"
        );
    }

    #[test]
    fn test_password_attempts_exhausted_error() {
        let err = Error::PasswordAttemptsExhausted(5);
        assert_eq!(err.to_string(), "Password attempts exhausted (limit: 5)");
    }

    #[test]
    fn test_settings_load_error() {
        let err = Error::SettingsLoad("file missing".to_string());
        assert_eq!(err.to_string(), "Settings load failed: file missing");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("timeouts.service_ms must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: timeouts.service_ms must be > 0"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_other_error() {
        let err = Error::Other("unknown error".to_string());
        assert_eq!(err.to_string(), "unknown error");
    }

    #[test]
    fn test_error_debug() {
        let err = Error::ProxyConnection("refused".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("ProxyConnection"));
    }
}
