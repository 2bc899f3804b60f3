//! Result taxonomies for operations and settings loading.
//!
//! These enums model *expected* outcomes that the pipeline branches on.
//! Genuine failures are carried by [`crate::Error`] instead.

use serde::{Deserialize, Serialize};

/// Outcome of an operation verb (perform, repeat or revert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationResult {
    /// The operation completed; the pipeline continues
    Success,
    /// Unexpected or unrecoverable failure; the pipeline stops with an error
    Failed,
    /// User-directed or policy-directed stop; the pipeline stops cleanly
    Aborted,
}

impl OperationResult {
    /// Whether the pipeline may continue past this result.
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success)
    }
}

/// Outcome of loading a settings resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadStatus {
    /// The resource was decrypted and parsed
    Success,
    /// The resource is password protected and no (or a wrong) password was supplied
    PasswordNeeded,
    /// The resource is an interactive login page, not a settings document
    LoadWithBrowser,
    /// The resource exists but its content is not valid settings data
    InvalidData,
    /// The resource uses a format this build does not support
    NotSupported,
    /// Loading failed for a reason outside the taxonomy
    UnexpectedError,
}

/// Outcome of persisting settings to the local client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveStatus {
    /// The configuration was written
    Success,
    /// The supplied administrator password did not match
    InvalidPassword,
    /// Persisting failed for a reason outside the taxonomy
    UnexpectedError,
}
