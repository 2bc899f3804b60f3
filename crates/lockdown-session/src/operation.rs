//! The unit of reversible work driven by the pipeline executor.

use lockdown_core::OperationResult;

use crate::context::SessionContext;

/// Observer receiving progress notifications while operations run.
///
/// This is a pure notification channel used to drive a busy indicator; the
/// pipeline's control flow never branches on observer state.
pub trait ProgressObserver: Send + Sync {
    /// A human-readable status line changed.
    fn on_status(&self, status: &str);

    /// Indeterminate progress was made (busy indicator tick).
    fn on_progress(&self);
}

/// Observer discarding all notifications.
#[derive(Debug, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_status(&self, _status: &str) {}
    fn on_progress(&self) {}
}

/// One reversible step of session establishment.
///
/// Implementations read `context.current()` and build up the pending
/// configuration; they must keep `revert` safe to call even when `perform`
/// never ran (idempotence under "nothing to revert").
pub trait Operation: Send {
    /// Name of the operation, used in log output.
    fn name(&self) -> &'static str;

    /// Establish this step for the pending session.
    fn perform(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult;

    /// Reconfigure this step from the active session to the pending one.
    fn repeat(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult;

    /// Tear this step down, best-effort.
    fn revert(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult;
}
