//! Session initialization - creates the pending configuration.

use std::sync::Arc;

use tracing::info;

use lockdown_core::OperationResult;
use lockdown_proxy::SettingsRepository;

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Creates a fresh pending session configuration.
///
/// All identifiers (session id, component ids, IPC addresses, the
/// authentication token) are regenerated here; nothing is carried over from
/// the previous session.
pub struct SessionInitializationOperation {
    repository: Arc<dyn SettingsRepository>,
}

impl SessionInitializationOperation {
    /// Create the operation.
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self { repository }
    }

    fn initialize(&self, context: &mut SessionContext) -> OperationResult {
        let configuration = self.repository.initialize_session_configuration();
        info!(
            "Initialized pending session: id={}, client_address='{}'",
            configuration.session_id, configuration.app_config.client_address
        );
        context.set_next(configuration);
        OperationResult::Success
    }
}

impl Operation for SessionInitializationOperation {
    fn name(&self) -> &'static str {
        "session initialization"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.initialize(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        // Reconfiguration also gets fresh identifiers
        self.initialize(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        OperationResult::Success
    }
}
