//! Proxy contract for the privileged background service.

use serde::{Deserialize, Serialize};

use lockdown_core::{Result, SessionId, Settings};

/// Command starting a service-side session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionCommand {
    /// Correlates this start with the matching stop
    pub session_id: SessionId,
    /// Identity of the operator starting the session
    pub operator: String,
    /// The full settings the service applies machine-level lockdown from
    pub settings: Settings,
}

/// Proxy to the privileged out-of-process service.
///
/// Accepting a command is decoupled from the lockdown actually being in
/// effect: after `start_session`/`stop_session` the runtime waits on the
/// named signal from [`session_event_name`], which the service raises once
/// its slow, non-atomic OS configuration changes have landed.
pub trait ServiceProxy: Send {
    /// Connect to the service endpoint.
    fn connect(&mut self) -> Result<()>;

    /// Disconnect from the service endpoint.
    fn disconnect(&mut self) -> Result<()>;

    /// Whether a connection is currently established.
    fn is_connected(&self) -> bool;

    /// Send the session start command.
    fn start_session(&mut self, command: &StartSessionCommand) -> Result<()>;

    /// Send the session stop command.
    fn stop_session(&mut self, session_id: SessionId) -> Result<()>;

    /// Request a system-configuration restore pass.
    ///
    /// Issued only when stopping the final session of the process lifetime.
    fn request_system_restore(&mut self) -> Result<()>;
}

/// Name of the cross-process signal the service raises once a start/stop
/// command has fully taken effect.
pub fn session_event_name(session_id: SessionId) -> String {
    format!("lockdown-service-{session_id}")
}
