//! Proxy contract for the user-facing client process.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lockdown_core::Result;

/// Identity assertion returned by the client during authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAuthentication {
    /// Process id the client claims to run as.
    ///
    /// Must match the process the runtime actually spawned; a mismatch means
    /// a different process bound the IPC address and is impersonating the
    /// client.
    pub process_id: u32,
}

/// Proxy to the spawned client process.
pub trait ClientProxy: Send {
    /// Open an authenticated connection using the per-session token.
    fn connect(&mut self, token: Uuid) -> Result<()>;

    /// Ask the client to assert its identity.
    fn request_authentication(&mut self) -> Result<ClientAuthentication>;

    /// Instruct the client to begin its own shutdown.
    fn initiate_shutdown(&mut self) -> Result<()>;

    /// Close the connection.
    fn disconnect(&mut self) -> Result<()>;
}

/// Name of the signal the client raises once its IPC endpoint is bound.
pub fn client_ready_signal_name(client_id: Uuid) -> String {
    format!("lockdown-client-ready-{client_id}")
}

/// Name of the signal raised on the runtime side once the client connection
/// has been torn down.
pub fn client_disconnected_signal_name(client_id: Uuid) -> String {
    format!("lockdown-client-disconnected-{client_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_names_are_distinct_per_client() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(client_ready_signal_name(a), client_ready_signal_name(b));
        assert_ne!(
            client_ready_signal_name(a),
            client_disconnected_signal_name(a)
        );
    }
}
