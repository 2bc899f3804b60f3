//! Explorer shell control contract for kiosk isolation.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use lockdown_core::Result;

/// Control over the interactive shell process and its windows.
pub trait ExplorerShell: Send {
    /// Hide all open shell windows.
    fn hide_all_windows(&mut self) -> Result<()>;

    /// Restore the windows hidden by `hide_all_windows`.
    fn restore_all_windows(&mut self) -> Result<()>;

    /// Terminate the shell process.
    fn terminate(&mut self) -> Result<()>;

    /// Start the shell process again.
    fn start(&mut self) -> Result<()>;
}

/// Logging stand-in recording shell state transitions.
#[derive(Debug)]
pub struct LoggingShell {
    running: AtomicBool,
    hidden: AtomicBool,
}

impl LoggingShell {
    /// Create a stand-in for a running, visible shell.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            hidden: AtomicBool::new(false),
        }
    }

    /// Whether the shell is recorded as running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether windows are recorded as hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }
}

impl Default for LoggingShell {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplorerShell for LoggingShell {
    fn hide_all_windows(&mut self) -> Result<()> {
        info!("Hiding all shell windows");
        self.hidden.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn restore_all_windows(&mut self) -> Result<()> {
        info!("Restoring all shell windows");
        self.hidden.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        info!("Terminating shell");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        info!("Starting shell");
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }
}
