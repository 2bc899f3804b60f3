//! Remote session detection.

use tracing::debug;

/// Detector reporting whether a remote session is attached.
pub trait RemoteSessionDetector: Send + Sync {
    /// Whether an active remote session was detected.
    fn is_remote_session(&self) -> bool;
}

/// Detector over environment markers left by remote attachment.
///
/// # Detection Logic
///
/// - `SSH_CONNECTION`, `SSH_CLIENT` or `SSH_TTY` present: an SSH session
/// - `SESSIONNAME` starting with `RDP-`: a Windows remote desktop session
#[derive(Debug, Default)]
pub struct EnvRemoteSessionDetector;

impl EnvRemoteSessionDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the marker rules against the given variables.
    pub fn matches(vars: &[(String, String)]) -> bool {
        for (name, value) in vars {
            match name.as_str() {
                "SSH_CONNECTION" | "SSH_CLIENT" | "SSH_TTY" if !value.is_empty() => {
                    return true;
                }
                "SESSIONNAME" if value.starts_with("RDP-") => {
                    return true;
                }
                _ => {}
            }
        }
        false
    }
}

impl RemoteSessionDetector for EnvRemoteSessionDetector {
    fn is_remote_session(&self) -> bool {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        let remote = Self::matches(&vars);
        if remote {
            debug!("Remote session markers present in environment");
        }
        remote
    }
}
