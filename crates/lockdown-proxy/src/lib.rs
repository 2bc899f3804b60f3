//! # lockdown-proxy
//!
//! Collaborator contracts for the lockdown runtime.
//!
//! The orchestration core never talks to the operating system, the privileged
//! service, the client process or the operator directly - it drives the thin
//! proxy interfaces defined here. This crate provides:
//!
//! - Service and client proxy contracts (cross-process IPC seams)
//! - Exam server proxy contract
//! - Process factory and handle (spawn, terminated signal, kill escalation)
//! - Named session signals for cross-process synchronization
//! - Desktop factory and explorer shell control contracts
//! - Settings repository (load, decrypt-status taxonomy, client write-back)
//! - User interaction surface (password, exam selection, failure prompts)
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends only on lockdown-core.
//! Contracts whose OS primitive is unavailable on a platform ship with a
//! logging stand-in so teardown stays best-effort instead of failing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod desktop;
pub mod exam;
pub mod interaction;
pub mod process;
pub mod repository;
pub mod service;
pub mod shell;
pub mod signal;
pub mod stub;

// Re-export commonly used types
pub use client::{ClientAuthentication, ClientProxy};
pub use desktop::{Desktop, DesktopFactory, LoggingDesktopFactory};
pub use exam::{Exam, ExamServerProxy};
pub use interaction::{
    NullInteraction, PasswordPurpose, ServerFailureAction, UserInteraction,
};
pub use process::{NativeProcessFactory, ProcessFactory, ProcessHandle};
pub use repository::{FileSettingsRepository, LoadOutcome, SettingsRepository};
pub use service::{ServiceProxy, StartSessionCommand};
pub use shell::{ExplorerShell, LoggingShell};
pub use signal::{SessionSignal, SignalHub};
pub use stub::{UnavailableClientProxy, UnavailableExamServerProxy, UnavailableServiceProxy};
