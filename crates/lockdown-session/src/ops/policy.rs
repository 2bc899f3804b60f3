//! Policy validation operations - stateless gates over the pending settings.
//!
//! Each gate is evaluated on both `perform` and `repeat` and is always a
//! no-op on `revert`. A violated policy aborts the pipeline; that is a
//! policy-directed stop, not a bug, so the result is `Aborted` rather than
//! `Failed`.

use std::sync::Arc;

use tracing::{error, warn};

use lockdown_core::version::satisfies_any;
use lockdown_core::{AppVersion, OperationResult, VmPolicy};
use lockdown_detector::{DisplayMonitor, RemoteSessionDetector, VirtualMachineDetector};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Aborts when the installed build satisfies none of the configured
/// version restrictions.
pub struct VersionRestrictionOperation {
    installed: AppVersion,
}

impl VersionRestrictionOperation {
    /// Gate against the given installed build version.
    pub fn new(installed: AppVersion) -> Self {
        Self { installed }
    }

    fn validate(&self, context: &SessionContext) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Version restriction gate ran without a pending session");
            return OperationResult::Failed;
        };

        let restrictions = &next.settings.security.version_restrictions;
        if satisfies_any(restrictions, &self.installed) {
            OperationResult::Success
        } else {
            error!(
                "Installed version {} satisfies none of the {} configured restrictions",
                self.installed,
                restrictions.len()
            );
            OperationResult::Aborted
        }
    }
}

impl Operation for VersionRestrictionOperation {
    fn name(&self) -> &'static str {
        "version restriction"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        OperationResult::Success
    }
}

/// Aborts when VM policy is `Deny` and a virtual machine is detected.
pub struct VirtualMachinePolicyOperation {
    detector: Arc<dyn VirtualMachineDetector>,
}

impl VirtualMachinePolicyOperation {
    /// Gate using the given detector.
    pub fn new(detector: Arc<dyn VirtualMachineDetector>) -> Self {
        Self { detector }
    }

    fn validate(&self, context: &SessionContext) -> OperationResult {
        let Some(next) = context.next() else {
            error!("VM policy gate ran without a pending session");
            return OperationResult::Failed;
        };

        if next.settings.security.vm_policy == VmPolicy::Deny
            && self.detector.is_virtual_machine()
        {
            error!("Virtual machine detected while policy denies virtual machines");
            return OperationResult::Aborted;
        }
        OperationResult::Success
    }
}

impl Operation for VirtualMachinePolicyOperation {
    fn name(&self) -> &'static str {
        "virtual machine policy"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        OperationResult::Success
    }
}

/// Aborts when remote sessions are disallowed and one is attached.
pub struct RemoteSessionPolicyOperation {
    detector: Arc<dyn RemoteSessionDetector>,
}

impl RemoteSessionPolicyOperation {
    /// Gate using the given detector.
    pub fn new(detector: Arc<dyn RemoteSessionDetector>) -> Self {
        Self { detector }
    }

    fn validate(&self, context: &SessionContext) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Remote session gate ran without a pending session");
            return OperationResult::Failed;
        };

        if !next.settings.security.remote_sessions_allowed
            && self.detector.is_remote_session()
        {
            error!("Active remote session detected while remote sessions are disallowed");
            return OperationResult::Aborted;
        }
        OperationResult::Success
    }
}

impl Operation for RemoteSessionPolicyOperation {
    fn name(&self) -> &'static str {
        "remote session policy"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        OperationResult::Success
    }
}

/// Aborts when the active display count violates the allowed-display policy.
pub struct DisplayConfigurationOperation {
    monitor: Arc<dyn DisplayMonitor>,
}

impl DisplayConfigurationOperation {
    /// Gate using the given display monitor.
    pub fn new(monitor: Arc<dyn DisplayMonitor>) -> Self {
        Self { monitor }
    }

    fn validate(&self, context: &SessionContext) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Display configuration gate ran without a pending session");
            return OperationResult::Failed;
        };

        let Some(allowed) = next.settings.display.allowed_display_count else {
            return OperationResult::Success;
        };

        let active = self.monitor.active_display_count();
        if active <= allowed {
            return OperationResult::Success;
        }

        if next.settings.display.ignore_error {
            warn!(
                "Display policy violated ({} active, {} allowed); configured to proceed",
                active, allowed
            );
            return OperationResult::Success;
        }

        error!(
            "Display policy violated: {} displays active, {} allowed",
            active, allowed
        );
        OperationResult::Aborted
    }
}

impl Operation for DisplayConfigurationOperation {
    fn name(&self) -> &'static str {
        "display configuration"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.validate(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        OperationResult::Success
    }
}
