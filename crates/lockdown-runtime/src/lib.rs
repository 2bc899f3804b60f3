//! Lockdown Runtime Library
//!
//! This library contains the session host and background probing; the
//! runtime binary itself is in main.rs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod host;
pub mod probe;

// Re-export commonly used types
pub use host::{HostDependencies, RuntimeOptions, SessionHost};
pub use probe::spawn_probe;
