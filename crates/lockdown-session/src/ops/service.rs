//! Service coordination - brackets the session with start/stop commands to
//! the privileged background service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use lockdown_core::{OperationResult, ServicePolicy, SessionId};
use lockdown_proxy::service::session_event_name;
use lockdown_proxy::{ServiceProxy, SignalHub, StartSessionCommand};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Connects to the privileged service and brackets the session.
///
/// Sending a command only means the service accepted it; machine-level
/// lockdown involves slow, non-atomic OS configuration changes. After each
/// start/stop the operation therefore blocks, with a bounded timeout, on the
/// named cross-process signal the service raises once the change is in
/// effect.
pub struct ServiceCoordinationOperation {
    proxy: Box<dyn ServiceProxy>,
    hub: Arc<SignalHub>,
    timeout: Duration,
    operator: String,
    final_stop: Arc<AtomicBool>,
    engaged: bool,
    active_policy: Option<ServicePolicy>,
    active_session: Option<SessionId>,
}

impl ServiceCoordinationOperation {
    /// Create the operation.
    ///
    /// `final_stop` is set by the host before the last teardown of the
    /// process lifetime; only that teardown requests a system restore pass.
    pub fn new(
        proxy: Box<dyn ServiceProxy>,
        hub: Arc<SignalHub>,
        timeout: Duration,
        operator: String,
        final_stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            proxy,
            hub,
            timeout,
            operator,
            final_stop,
            engaged: false,
            active_policy: None,
            active_session: None,
        }
    }

    /// Connect honoring the policy. Returns `None` when the session may
    /// proceed without the service, `Some(result)` to stop the pipeline.
    fn ensure_connected(&mut self, policy: ServicePolicy) -> Option<OperationResult> {
        if self.proxy.is_connected() {
            return None;
        }
        match self.proxy.connect() {
            Ok(()) => None,
            Err(e) => match policy {
                ServicePolicy::Mandatory => {
                    error!("Service is mandatory but unavailable: {}", e);
                    Some(OperationResult::Failed)
                }
                ServicePolicy::Warn => {
                    warn!("Service unavailable, session proceeds without it: {}", e);
                    self.engaged = false;
                    self.active_policy = Some(policy);
                    Some(OperationResult::Success)
                }
                ServicePolicy::Ignore => Some(OperationResult::Success),
            },
        }
    }

    /// Send the start command and wait for the lockdown-applied signal.
    fn start_service_session(&mut self, context: &SessionContext) -> bool {
        let Some(next) = context.next() else {
            error!("Service start requested without a pending session");
            return false;
        };

        let session_id = next.session_id;
        let signal = self.hub.get(&session_event_name(session_id));
        signal.reset();

        let command = StartSessionCommand {
            session_id,
            operator: self.operator.clone(),
            settings: next.settings.clone(),
        };

        info!("Starting service session: id={}", session_id);
        if let Err(e) = self.proxy.start_session(&command) {
            error!("Service rejected the start command: {}", e);
            return false;
        }

        if !signal.wait(self.timeout) {
            error!(
                "Service did not confirm lockdown within {}ms",
                self.timeout.as_millis()
            );
            return false;
        }

        self.engaged = true;
        self.active_session = Some(session_id);
        true
    }

    /// Send the stop command and wait for the restore-applied signal.
    fn stop_service_session(&mut self) -> bool {
        let Some(session_id) = self.active_session else {
            return true;
        };

        let signal = self.hub.get(&session_event_name(session_id));
        signal.reset();

        info!("Stopping service session: id={}", session_id);
        if let Err(e) = self.proxy.stop_session(session_id) {
            error!("Service rejected the stop command: {}", e);
            return false;
        }

        if !signal.wait(self.timeout) {
            error!(
                "Service did not confirm session stop within {}ms",
                self.timeout.as_millis()
            );
            return false;
        }

        self.engaged = false;
        self.active_session = None;
        true
    }
}

impl Operation for ServiceCoordinationOperation {
    fn name(&self) -> &'static str {
        "service coordination"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Service coordination ran without a pending session");
            return OperationResult::Failed;
        };
        let policy = next.settings.service.policy;

        if policy == ServicePolicy::Ignore {
            debug!("Service policy is ignore, skipping service coordination");
            self.active_policy = Some(policy);
            return OperationResult::Success;
        }

        if let Some(result) = self.ensure_connected(policy) {
            return result;
        }

        if self.start_service_session(context) {
            self.active_policy = Some(policy);
            OperationResult::Success
        } else {
            OperationResult::Failed
        }
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Service coordination ran without a pending session");
            return OperationResult::Failed;
        };
        let target = next.settings.service.policy;

        // Nothing to hand over when no session is engaged and the policy is
        // unchanged
        if !self.engaged && self.active_policy == Some(target) {
            debug!(
                "Service policy unchanged ({:?}), no service session to replace",
                target
            );
            return OperationResult::Success;
        }

        // Stop the running session first; a failed stop short-circuits
        if self.engaged && !self.stop_service_session() {
            return OperationResult::Failed;
        }

        if target == ServicePolicy::Ignore {
            if self.proxy.is_connected() {
                if let Err(e) = self.proxy.disconnect() {
                    error!("Service disconnect failed: {}", e);
                    return OperationResult::Failed;
                }
            }
            self.active_policy = Some(target);
            return OperationResult::Success;
        }

        if let Some(result) = self.ensure_connected(target) {
            return result;
        }

        if self.start_service_session(context) {
            self.active_policy = Some(target);
            OperationResult::Success
        } else {
            OperationResult::Failed
        }
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        if self.engaged && !self.stop_service_session() {
            // Teardown is best-effort; log and keep unwinding
            warn!("Service session did not stop cleanly during teardown");
            self.engaged = false;
            self.active_session = None;
        }

        if self.proxy.is_connected() {
            if self.final_stop.load(Ordering::SeqCst) {
                info!("Final session stop, requesting system restore pass");
                if let Err(e) = self.proxy.request_system_restore() {
                    warn!("System restore request failed: {}", e);
                }
            }
            if let Err(e) = self.proxy.disconnect() {
                warn!("Service disconnect failed during teardown: {}", e);
            }
        }

        self.active_policy = None;
        OperationResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::NullObserver;
    use crate::testing::FakeServiceProxy;
    use lockdown_core::{SessionConfiguration, Settings};
    use std::path::Path;

    fn context_with_policy(policy: ServicePolicy) -> SessionContext {
        let mut settings = Settings::default();
        settings.service.policy = policy;
        let mut context = SessionContext::new();
        context.set_next(SessionConfiguration::new(
            settings,
            Path::new("/tmp/lockdown-tests"),
        ));
        context
    }

    fn operation_with(
        proxy: FakeServiceProxy,
        hub: Arc<SignalHub>,
    ) -> (
        ServiceCoordinationOperation,
        Arc<std::sync::Mutex<crate::testing::ServiceProxyState>>,
        Arc<AtomicBool>,
    ) {
        let state = proxy.state();
        let final_stop = Arc::new(AtomicBool::new(false));
        let operation = ServiceCoordinationOperation::new(
            Box::new(proxy),
            hub,
            Duration::from_millis(500),
            "operator".to_string(),
            Arc::clone(&final_stop),
        );
        (operation, state, final_stop)
    }

    #[test]
    fn test_perform_mandatory_starts_session() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);
        let mut context = context_with_policy(ServicePolicy::Mandatory);

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        let state = state.lock().unwrap();
        assert_eq!(state.starts.len(), 1);
        assert_eq!(state.starts[0], context.next().unwrap().session_id);
    }

    #[test]
    fn test_perform_mandatory_unavailable_fails() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(
            FakeServiceProxy::new(Arc::clone(&hub)).unavailable(),
            hub,
        );
        let mut context = context_with_policy(ServicePolicy::Mandatory);

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Failed
        );
        assert!(state.lock().unwrap().starts.is_empty());
    }

    #[test]
    fn test_perform_warn_unavailable_proceeds() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(
            FakeServiceProxy::new(Arc::clone(&hub)).unavailable(),
            hub,
        );
        let mut context = context_with_policy(ServicePolicy::Warn);

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );
        assert!(state.lock().unwrap().starts.is_empty());
    }

    #[test]
    fn test_perform_ignore_skips_service_entirely() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);
        let mut context = context_with_policy(ServicePolicy::Ignore);

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );
        let state = state.lock().unwrap();
        assert!(!state.connected);
        assert!(state.starts.is_empty());
    }

    #[test]
    fn test_perform_fails_when_lockdown_never_confirmed() {
        let hub = Arc::new(SignalHub::new());
        let proxy = FakeServiceProxy::new(Arc::clone(&hub)).silent();
        let state = proxy.state();
        let mut op = ServiceCoordinationOperation::new(
            Box::new(proxy),
            hub,
            Duration::from_millis(50),
            "operator".to_string(),
            Arc::new(AtomicBool::new(false)),
        );
        let mut context = context_with_policy(ServicePolicy::Mandatory);

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Failed
        );
        // The command was sent but never confirmed
        assert_eq!(state.lock().unwrap().starts.len(), 1);
    }

    #[test]
    fn test_repeat_stops_then_starts_fresh() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);

        let mut context = context_with_policy(ServicePolicy::Mandatory);
        op.perform(&mut context, &NullObserver);
        let first_id = context.next().unwrap().session_id;
        context.activate_next().unwrap();

        let mut reconfigured = context_with_policy(ServicePolicy::Mandatory);
        let result = op.repeat(&mut reconfigured, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        let state = state.lock().unwrap();
        assert_eq!(state.stops, vec![first_id]);
        assert_eq!(state.starts.len(), 2);
    }

    #[test]
    fn test_repeat_same_ignore_policy_issues_zero_commands() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);

        let mut context = context_with_policy(ServicePolicy::Ignore);
        op.perform(&mut context, &NullObserver);
        context.activate_next().unwrap();

        let mut reconfigured = context_with_policy(ServicePolicy::Ignore);
        assert_eq!(
            op.repeat(&mut reconfigured, &NullObserver),
            OperationResult::Success
        );

        let state = state.lock().unwrap();
        assert!(state.starts.is_empty());
        assert!(state.stops.is_empty());
    }

    #[test]
    fn test_repeat_to_ignore_stops_and_disconnects() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);

        let mut context = context_with_policy(ServicePolicy::Mandatory);
        op.perform(&mut context, &NullObserver);
        context.activate_next().unwrap();

        let mut reconfigured = context_with_policy(ServicePolicy::Ignore);
        assert_eq!(
            op.repeat(&mut reconfigured, &NullObserver),
            OperationResult::Success
        );

        let state = state.lock().unwrap();
        assert_eq!(state.stops.len(), 1);
        assert_eq!(state.starts.len(), 1); // only the original start
        assert!(!state.connected);
        assert_eq!(state.disconnects, 1);
    }

    #[test]
    fn test_revert_final_stop_requests_restore() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, final_stop) =
            operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);

        let mut context = context_with_policy(ServicePolicy::Mandatory);
        op.perform(&mut context, &NullObserver);

        final_stop.store(true, Ordering::SeqCst);
        assert_eq!(
            op.revert(&mut context, &NullObserver),
            OperationResult::Success
        );

        let state = state.lock().unwrap();
        assert_eq!(state.stops.len(), 1);
        assert_eq!(state.restores, 1);
        assert!(!state.connected);
    }

    #[test]
    fn test_revert_intermediate_stop_skips_restore() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);

        let mut context = context_with_policy(ServicePolicy::Mandatory);
        op.perform(&mut context, &NullObserver);

        op.revert(&mut context, &NullObserver);
        assert_eq!(state.lock().unwrap().restores, 0);
    }

    #[test]
    fn test_revert_without_perform_is_noop() {
        let hub = Arc::new(SignalHub::new());
        let (mut op, state, _) = operation_with(FakeServiceProxy::new(Arc::clone(&hub)), hub);
        let mut context = SessionContext::new();

        assert_eq!(
            op.revert(&mut context, &NullObserver),
            OperationResult::Success
        );
        let state = state.lock().unwrap();
        assert!(state.stops.is_empty());
        assert_eq!(state.disconnects, 0);
    }
}
