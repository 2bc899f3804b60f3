//! User interaction surface.
//!
//! Every prompt is a blocking call returning a structured result. The
//! runtime routes calls through either its own window or, when a client
//! already owns focus, a bridge to the client - so only one UI surface
//! prompts at a time. This module only defines the contract; rendering is a
//! collaborator concern.

use crate::exam::Exam;

/// What a requested password is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordPurpose {
    /// The machine's administrator password
    LocalAdmin,
    /// The password protecting a local settings resource
    LocalSettings,
    /// The password protecting a remote settings resource
    RemoteSettings,
}

/// Operator decision after a failed exam server call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFailureAction {
    /// Retry the failed call
    Retry,
    /// Abort session establishment
    Abort,
    /// Degrade to an unrestricted normal session
    Fallback,
}

/// Blocking prompt surface towards the operator.
///
/// Prompts have no timeout; they are cancellable only by the operator's own
/// input (`None` / `Abort` results).
pub trait UserInteraction: Send + Sync {
    /// Ask for a password. `None` means the operator cancelled.
    fn request_password(&self, purpose: PasswordPurpose) -> Option<String>;

    /// Ask the operator to pick an exam. `None` means cancelled.
    fn select_exam(&self, exams: &[Exam]) -> Option<String>;

    /// Surface a server error and ask how to proceed.
    ///
    /// `Fallback` is only offered when `fallback_enabled` is set.
    fn server_failure_action(&self, message: &str, fallback_enabled: bool) -> ServerFailureAction;

    /// Ask a yes/no question.
    fn confirm(&self, message: &str) -> bool;

    /// Show an informational message.
    fn show_message(&self, message: &str);
}

/// Interaction surface for headless operation: cancels every prompt.
#[derive(Debug, Default)]
pub struct NullInteraction;

impl UserInteraction for NullInteraction {
    fn request_password(&self, _purpose: PasswordPurpose) -> Option<String> {
        None
    }

    fn select_exam(&self, _exams: &[Exam]) -> Option<String> {
        None
    }

    fn server_failure_action(
        &self,
        _message: &str,
        _fallback_enabled: bool,
    ) -> ServerFailureAction {
        ServerFailureAction::Abort
    }

    fn confirm(&self, _message: &str) -> bool {
        false
    }

    fn show_message(&self, _message: &str) {}
}
