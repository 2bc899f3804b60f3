//! Named session signals for cross-process synchronization.
//!
//! A [`SessionSignal`] decouples "the command was accepted" from "the effect
//! is actually in place": the runtime sends a command over a proxy, then
//! blocks with a bounded timeout until the collaborator raises the signal.
//! The [`SignalHub`] resolves signals by name; on platforms with named OS
//! events a hub backed by those is a drop-in, the built-in hub is
//! process-local.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::debug;

/// A raisable, resettable signal with bounded waits.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    name: String,
    inner: Arc<SignalInner>,
}

#[derive(Debug)]
struct SignalInner {
    raised: Mutex<bool>,
    condvar: Condvar,
}

impl SessionSignal {
    /// Create a new, unraised signal.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(SignalInner {
                raised: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Get the signal's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raise the signal, waking all current and future waiters.
    pub fn raise(&self) {
        debug!("Raising signal '{}'", self.name);
        let mut raised = self.inner.raised.lock().unwrap();
        *raised = true;
        self.inner.condvar.notify_all();
    }

    /// Rearm the signal so the next wait blocks again.
    pub fn reset(&self) {
        debug!("Resetting signal '{}'", self.name);
        let mut raised = self.inner.raised.lock().unwrap();
        *raised = false;
    }

    /// Whether the signal is currently raised.
    pub fn is_raised(&self) -> bool {
        *self.inner.raised.lock().unwrap()
    }

    /// Block until the signal is raised or the timeout elapses.
    ///
    /// Returns `true` if the signal was raised within the timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let raised = self.inner.raised.lock().unwrap();
        let (raised, result) = self
            .inner
            .condvar
            .wait_timeout_while(raised, timeout, |raised| !*raised)
            .unwrap();
        if result.timed_out() && !*raised {
            debug!(
                "Wait on signal '{}' timed out after {}ms",
                self.name,
                timeout.as_millis()
            );
            return false;
        }
        true
    }
}

/// Process-local registry resolving signals by name.
///
/// Two lookups with the same name observe the same signal, which is what
/// gives separate components (and tests standing in for separate processes)
/// a shared synchronization point.
#[derive(Debug, Default)]
pub struct SignalHub {
    signals: Mutex<HashMap<String, SessionSignal>>,
}

impl SignalHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the signal with the given name, creating it if needed.
    pub fn get(&self, name: &str) -> SessionSignal {
        let mut signals = self.signals.lock().unwrap();
        signals
            .entry(name.to_string())
            .or_insert_with(|| SessionSignal::new(name))
            .clone()
    }

    /// Drop a named signal from the hub.
    ///
    /// Existing clones keep working; the next `get` creates a fresh one.
    pub fn remove(&self, name: &str) {
        let mut signals = self.signals.lock().unwrap();
        signals.remove(name);
    }
}
