//! # lockdown-core
//!
//! Core types for the lockdown session runtime.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other lockdown crates. It provides:
//!
//! - Session types (SessionId, AppConfig, SessionConfiguration)
//! - The user-facing settings tree (kiosk, service, security, display, server)
//! - Password parameters for gated reconfiguration
//! - Version restriction matching
//! - Operation/load/save result taxonomies
//! - Runtime process configuration
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other lockdown crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all modules
pub mod config;
pub mod error;
pub mod session;
pub mod settings;
pub mod status;
pub mod version;

// Re-export commonly used types
pub use config::{LimitSettings, PathSettings, RuntimeConfig, TimeoutSettings};
pub use error::{Error, Result};
pub use session::{AppConfig, PasswordParameters, SessionConfiguration, SessionId};
pub use settings::{
    BrowserSettings, DisplaySettings, KioskMode, SecuritySettings, ServerSettings,
    ServicePolicy, ServiceSettings, SessionMode, Settings, VmPolicy,
};
pub use status::{LoadStatus, OperationResult, SaveStatus};
pub use version::{AppVersion, VersionRestriction};
