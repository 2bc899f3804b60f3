//! Concrete operations, in their canonical pipeline order:
//!
//! 1. [`SessionInitializationOperation`] - fresh pending configuration
//! 2. [`ConfigurationResolutionOperation`] - locate, decrypt and apply settings
//! 3. [`VersionRestrictionOperation`] - build version gate
//! 4. [`VirtualMachinePolicyOperation`] - VM gate
//! 5. [`RemoteSessionPolicyOperation`] - remote session gate
//! 6. [`DisplayConfigurationOperation`] - display topology gate
//! 7. [`ExamNegotiationOperation`] - server-driven exam selection
//! 8. [`ServiceCoordinationOperation`] - privileged service bracket
//! 9. [`KioskIsolationOperation`] - desktop/shell isolation
//! 10. [`ClientLifecycleOperation`] - client process ownership
//! 11. [`SessionActivationOperation`] - promote pending to active

pub mod activation;
pub mod client;
pub mod configuration;
pub mod exam;
pub mod initialization;
pub mod kiosk;
pub mod policy;
pub mod service;

pub use activation::SessionActivationOperation;
pub use client::ClientLifecycleOperation;
pub use configuration::ConfigurationResolutionOperation;
pub use exam::ExamNegotiationOperation;
pub use initialization::SessionInitializationOperation;
pub use kiosk::KioskIsolationOperation;
pub use policy::{
    DisplayConfigurationOperation, RemoteSessionPolicyOperation, VersionRestrictionOperation,
    VirtualMachinePolicyOperation,
};
pub use service::ServiceCoordinationOperation;
