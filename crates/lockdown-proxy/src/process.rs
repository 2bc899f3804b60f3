//! Process spawning and lifetime tracking.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use lockdown_core::{Error, Result};

use crate::signal::SessionSignal;

/// Handle to a spawned process.
pub trait ProcessHandle: Send {
    /// Process id of the spawned process.
    fn id(&self) -> u32;

    /// Whether the process has terminated.
    fn has_terminated(&self) -> bool;

    /// Signal raised once the process terminates (for any reason).
    fn terminated(&self) -> SessionSignal;

    /// Try to kill the process, waiting up to `timeout` for it to die.
    ///
    /// Returns `true` once the process is gone.
    fn try_kill(&mut self, timeout: Duration) -> bool;
}

/// Factory for spawning processes.
pub trait ProcessFactory: Send + Sync {
    /// Spawn a new process with the given arguments.
    fn start_new(&self, path: &Path, args: &[String]) -> Result<Box<dyn ProcessHandle>>;
}

/// Process factory over `std::process::Command`.
#[derive(Debug, Default)]
pub struct NativeProcessFactory;

impl NativeProcessFactory {
    /// Create a new factory.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessFactory for NativeProcessFactory {
    fn start_new(&self, path: &Path, args: &[String]) -> Result<Box<dyn ProcessHandle>> {
        info!("Spawning process: path='{}' args={:?}", path.display(), args);

        let child = Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn '{}': {}", path.display(), e);
                Error::ProcessSpawn(format!("{}: {e}", path.display()))
            })?;

        let pid = child.id();
        info!("Process spawned successfully: pid={}", pid);

        Ok(Box::new(NativeProcessHandle::watch(child)))
    }
}

/// Handle to a natively spawned child process.
pub struct NativeProcessHandle {
    child: Arc<Mutex<Child>>,
    pid: u32,
    terminated: SessionSignal,
}

impl std::fmt::Debug for NativeProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeProcessHandle")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl NativeProcessHandle {
    /// Wrap a child process and start the termination watcher.
    fn watch(child: Child) -> Self {
        let pid = child.id();
        let child = Arc::new(Mutex::new(child));
        let terminated = SessionSignal::new(format!("process-terminated-{pid}"));

        let watcher_child = Arc::clone(&child);
        let watcher_signal = terminated.clone();
        std::thread::spawn(move || loop {
            {
                let mut child = watcher_child.lock().unwrap();
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Process {} exited with {:?}", pid, status.code());
                        watcher_signal.raise();
                        return;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to poll process {}: {}", pid, e);
                        watcher_signal.raise();
                        return;
                    }
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        });

        Self {
            child,
            pid,
            terminated,
        }
    }

    /// Kill a process by PID (platform-specific implementation).
    #[cfg(unix)]
    fn kill_process(pid: u32) {
        unsafe {
            libc::kill(pid as i32, libc::SIGKILL);
        }
    }

    /// Kill a process by PID (Windows implementation).
    #[cfg(windows)]
    fn kill_process(pid: u32) {
        // Use taskkill on Windows to terminate the process
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output();
    }
}

impl ProcessHandle for NativeProcessHandle {
    fn id(&self) -> u32 {
        self.pid
    }

    fn has_terminated(&self) -> bool {
        self.terminated.is_raised()
    }

    fn terminated(&self) -> SessionSignal {
        self.terminated.clone()
    }

    fn try_kill(&mut self, timeout: Duration) -> bool {
        if self.has_terminated() {
            return true;
        }

        info!("Killing process: pid={}", self.pid);
        {
            let mut child = self.child.lock().unwrap();
            if let Err(e) = child.kill() {
                warn!("Kill request for process {} failed: {}", self.pid, e);
            }
        }

        if self.terminated.wait(timeout) {
            return true;
        }

        // The polite request did not take; escalate
        Self::kill_process(self.pid);
        self.terminated.wait(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sleep_command() -> (PathBuf, Vec<String>) {
        if cfg!(windows) {
            (
                PathBuf::from("cmd.exe"),
                vec!["/c".to_string(), "ping -n 30 127.0.0.1 > NUL".to_string()],
            )
        } else {
            (PathBuf::from("sleep"), vec!["30".to_string()])
        }
    }

    #[test]
    fn test_spawn_and_kill() {
        let factory = NativeProcessFactory::new();
        let (path, args) = sleep_command();

        let mut handle = factory.start_new(&path, &args).unwrap();
        assert!(!handle.has_terminated());
        assert!(handle.id() > 0);

        assert!(handle.try_kill(Duration::from_secs(5)));
        assert!(handle.has_terminated());
    }

    #[test]
    fn test_terminated_signal_raised_on_exit() {
        let factory = NativeProcessFactory::new();
        let path = if cfg!(windows) {
            PathBuf::from("cmd.exe")
        } else {
            PathBuf::from("true")
        };
        let args = if cfg!(windows) {
            vec!["/c".to_string(), "exit 0".to_string()]
        } else {
            vec![]
        };

        let handle = factory.start_new(&path, &args).unwrap();
        assert!(handle.terminated().wait(Duration::from_secs(5)));
        assert!(handle.has_terminated());
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let factory = NativeProcessFactory::new();
        let result = factory.start_new(Path::new("/nonexistent/binary"), &[]);
        assert!(matches!(result, Err(Error::ProcessSpawn(_))));
    }

    #[test]
    fn test_kill_already_terminated_is_true() {
        let factory = NativeProcessFactory::new();
        let path = if cfg!(windows) {
            PathBuf::from("cmd.exe")
        } else {
            PathBuf::from("true")
        };
        let args = if cfg!(windows) {
            vec!["/c".to_string(), "exit 0".to_string()]
        } else {
            vec![]
        };

        let mut handle = factory.start_new(&path, &args).unwrap();
        handle.terminated().wait(Duration::from_secs(5));
        assert!(handle.try_kill(Duration::from_millis(100)));
    }
}
