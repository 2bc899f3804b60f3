//! Session activation - promotes the pending configuration to active.

use tracing::error;

use lockdown_core::OperationResult;

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Promotes `next` to `current` once every preceding step succeeded.
///
/// This is the designated activation step: no other operation swaps the two
/// configurations.
#[derive(Debug, Default)]
pub struct SessionActivationOperation;

impl SessionActivationOperation {
    /// Create the operation.
    pub fn new() -> Self {
        Self
    }

    fn activate(&self, context: &mut SessionContext) -> OperationResult {
        match context.activate_next() {
            Ok(()) => OperationResult::Success,
            Err(e) => {
                error!("Session activation failed: {}", e);
                OperationResult::Failed
            }
        }
    }
}

impl Operation for SessionActivationOperation {
    fn name(&self) -> &'static str {
        "session activation"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.activate(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.activate(context)
    }

    fn revert(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        context.clear_current();
        OperationResult::Success
    }
}
