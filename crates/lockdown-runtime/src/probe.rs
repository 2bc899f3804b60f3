//! Background reachability probing for the exam server.
//!
//! Dispatched onto a background task; the pipeline never awaits it. The UI
//! layer consumes the result asynchronously to annotate the server status.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long one connection attempt may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Extract `host:port` from a server URL.
///
/// Returns `None` for URLs without a usable authority. Ports default to 443
/// for `https` and 80 otherwise.
pub fn endpoint_from_url(url: &str) -> Option<String> {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };

    let authority = rest.split(['/', '?', '#']).next()?.trim();
    if authority.is_empty() {
        return None;
    }

    if authority.contains(':') {
        Some(authority.to_string())
    } else {
        let port = if scheme.eq_ignore_ascii_case("https") {
            443
        } else {
            80
        };
        Some(format!("{authority}:{port}"))
    }
}

/// Probe the server once. Returns whether a TCP connection succeeded.
pub async fn probe_server(url: String) -> bool {
    let Some(endpoint) = endpoint_from_url(&url) else {
        warn!("Cannot probe server, unusable URL: '{}'", url);
        return false;
    };

    debug!("Probing server reachability: {}", endpoint);
    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&endpoint)).await {
        Ok(Ok(_)) => {
            info!("Server '{}' is reachable", endpoint);
            true
        }
        Ok(Err(e)) => {
            warn!("Server '{}' is not reachable: {}", endpoint, e);
            false
        }
        Err(_) => {
            warn!(
                "Server '{}' did not answer within {}s",
                endpoint,
                PROBE_TIMEOUT.as_secs()
            );
            false
        }
    }
}

/// Dispatch a reachability probe onto a background task.
pub fn spawn_probe(url: String) -> JoinHandle<bool> {
    tokio::spawn(probe_server(url))
}
