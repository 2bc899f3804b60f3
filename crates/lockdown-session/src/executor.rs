//! Ordered execution of operations with best-effort reverse teardown.

use tracing::{error, info, warn};

use lockdown_core::OperationResult;

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Runs an ordered list of operations against the shared session context.
///
/// `perform`/`repeat` stop at the first operation whose result is not
/// `Success`. `revert` walks the list in reverse and never stops: teardown
/// is best-effort and total, failures are logged.
///
/// The executor never auto-reverts completed steps when a `perform` fails
/// partway. It records a high-water mark of successfully performed
/// operations; the caller discards the pending configuration and may call
/// [`PipelineExecutor::revert_performed`] to unwind exactly the prefix that
/// ran.
pub struct PipelineExecutor {
    operations: Vec<Box<dyn Operation>>,
    high_water: usize,
}

impl PipelineExecutor {
    /// Create an executor over the given operations, in execution order.
    pub fn new(operations: Vec<Box<dyn Operation>>) -> Self {
        Self {
            operations,
            high_water: 0,
        }
    }

    /// Number of operations in the pipeline.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Establish a session: invoke `perform` on each operation in order.
    pub fn perform(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.high_water = 0;
        for (index, operation) in self.operations.iter_mut().enumerate() {
            info!("Performing operation '{}'", operation.name());
            observer.on_status(operation.name());
            observer.on_progress();

            let result = operation.perform(context, observer);
            if !result.is_success() {
                warn!(
                    "Operation '{}' finished with {:?}, stopping pipeline",
                    operation.name(),
                    result
                );
                return result;
            }
            self.high_water = index + 1;
        }
        OperationResult::Success
    }

    /// Reconfigure a session: invoke `repeat` on each operation in order.
    pub fn repeat(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult {
        for operation in self.operations.iter_mut() {
            info!("Repeating operation '{}'", operation.name());
            observer.on_status(operation.name());
            observer.on_progress();

            let result = operation.repeat(context, observer);
            if !result.is_success() {
                warn!(
                    "Operation '{}' finished with {:?}, stopping pipeline",
                    operation.name(),
                    result
                );
                return result;
            }
        }
        OperationResult::Success
    }

    /// Tear a session down: invoke `revert` on every operation in reverse
    /// order, regardless of individual results.
    pub fn revert(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult {
        for operation in self.operations.iter_mut().rev() {
            info!("Reverting operation '{}'", operation.name());
            observer.on_status(operation.name());
            observer.on_progress();

            let result = operation.revert(context, observer);
            if !result.is_success() {
                error!(
                    "Operation '{}' failed to revert ({:?}); continuing teardown",
                    operation.name(),
                    result
                );
            }
        }
        self.high_water = 0;
        OperationResult::Success
    }

    /// Unwind only the operations the last `perform` completed, in reverse.
    ///
    /// Used after a mid-pipeline failure; operations past the high-water
    /// mark never ran and are not touched.
    pub fn revert_performed(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult {
        for operation in self.operations[..self.high_water].iter_mut().rev() {
            info!("Reverting performed operation '{}'", operation.name());
            observer.on_status(operation.name());

            let result = operation.revert(context, observer);
            if !result.is_success() {
                error!(
                    "Operation '{}' failed to revert ({:?}); continuing teardown",
                    operation.name(),
                    result
                );
            }
        }
        self.high_water = 0;
        OperationResult::Success
    }
}
