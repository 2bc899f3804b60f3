//! The shared session context driven through the pipeline.

use tracing::{info, warn};

use lockdown_core::{Error, Result, SessionConfiguration};
use lockdown_proxy::{ClientProxy, ProcessHandle};

/// Mutable record of the currently-active and pending session.
///
/// Created once at runtime startup and alive until process exit. Operations
/// read [`SessionContext::current`] and build up the pending configuration;
/// only the session activation step promotes `next` to `current`. The
/// context is single-writer: exactly one operation mutates it at a time.
#[derive(Default)]
pub struct SessionContext {
    current: Option<SessionConfiguration>,
    next: Option<SessionConfiguration>,
    client_process: Option<Box<dyn ProcessHandle>>,
    client_proxy: Option<Box<dyn ClientProxy>>,
    reconfiguration_uri: Option<String>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("current", &self.current.as_ref().map(|c| c.session_id))
            .field("next", &self.next.as_ref().map(|c| c.session_id))
            .field("has_client_process", &self.client_process.is_some())
            .field("has_client_proxy", &self.client_proxy.is_some())
            .finish()
    }
}

impl SessionContext {
    /// Create an empty context (no session active, none pending).
    pub fn new() -> Self {
        Self::default()
    }

    /// The active session configuration, if any.
    pub fn current(&self) -> Option<&SessionConfiguration> {
        self.current.as_ref()
    }

    /// The pending session configuration, if any.
    pub fn next(&self) -> Option<&SessionConfiguration> {
        self.next.as_ref()
    }

    /// Mutable access to the pending session configuration.
    pub fn next_mut(&mut self) -> Option<&mut SessionConfiguration> {
        self.next.as_mut()
    }

    /// Install a fresh pending configuration.
    pub fn set_next(&mut self, configuration: SessionConfiguration) {
        info!(
            "Pending session created: id={}",
            configuration.session_id
        );
        self.next = Some(configuration);
    }

    /// Promote the pending configuration to the active one.
    ///
    /// This is the only place the `next` → `current` swap happens.
    pub fn activate_next(&mut self) -> Result<()> {
        let next = self
            .next
            .take()
            .ok_or_else(|| Error::Other("no pending session to activate".to_string()))?;
        info!("Session activated: id={}", next.session_id);
        self.current = Some(next);
        Ok(())
    }

    /// Drop the active configuration (session fully torn down).
    pub fn clear_current(&mut self) -> Option<SessionConfiguration> {
        if let Some(current) = &self.current {
            info!("Session deactivated: id={}", current.session_id);
        }
        self.current.take()
    }

    /// Discard the pending configuration and every handle scoped to it.
    ///
    /// Called when the pipeline aborts before activation; nothing of the
    /// abandoned session may leak into the next attempt.
    pub fn discard_next(&mut self) {
        if let Some(next) = &self.next {
            info!("Discarding pending session: id={}", next.session_id);
        }
        self.next = None;
        self.client_proxy = None;
        if let Some(process) = &self.client_process {
            if !process.has_terminated() {
                warn!(
                    "Discarding handle to still-running client process: pid={}",
                    process.id()
                );
            }
        }
        self.client_process = None;
    }

    /// Hand the spawned client process to the context.
    pub fn set_client_process(&mut self, process: Box<dyn ProcessHandle>) {
        self.client_process = Some(process);
    }

    /// The spawned client process, if one is held.
    pub fn client_process(&self) -> Option<&(dyn ProcessHandle)> {
        self.client_process.as_deref()
    }

    /// Take ownership of the client process handle.
    pub fn take_client_process(&mut self) -> Option<Box<dyn ProcessHandle>> {
        self.client_process.take()
    }

    /// Hand the connected client proxy to the context.
    pub fn set_client_proxy(&mut self, proxy: Box<dyn ClientProxy>) {
        self.client_proxy = Some(proxy);
    }

    /// Take ownership of the client proxy.
    pub fn take_client_proxy(&mut self) -> Option<Box<dyn ClientProxy>> {
        self.client_proxy.take()
    }

    /// Whether a client process handle is currently held.
    pub fn has_client_process(&self) -> bool {
        self.client_process.is_some()
    }

    /// Remember the URI a reconfiguration request came from.
    pub fn set_reconfiguration_uri(&mut self, uri: Option<String>) {
        self.reconfiguration_uri = uri;
    }

    /// The URI of the pending reconfiguration request, if any.
    pub fn reconfiguration_uri(&self) -> Option<&str> {
        self.reconfiguration_uri.as_deref()
    }
}
