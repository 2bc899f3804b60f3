//! Client lifecycle - owns the user-facing client process from spawn to
//! termination.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lockdown_core::{Error, OperationResult};
use lockdown_proxy::client::{client_disconnected_signal_name, client_ready_signal_name};
use lockdown_proxy::{ClientProxy, ProcessFactory, ProcessHandle, SignalHub};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// How the spawn wait ended.
enum SpawnWait {
    Ready,
    Died,
    Timeout,
}

/// Spawns the client, performs the readiness handshake and authenticated
/// proxy connection, and tears the client down with escalation.
///
/// The identity assertion exists to prevent a different process from
/// impersonating the client by guessing the IPC address: the asserted
/// process id must be the one the runtime actually spawned.
pub struct ClientLifecycleOperation {
    factory: Arc<dyn ProcessFactory>,
    proxy: Option<Box<dyn ClientProxy>>,
    hub: Arc<SignalHub>,
    client_path: PathBuf,
    timeout: Duration,
    kill_attempts: u32,
    kill_pause: Duration,
    headless: bool,
    active_client_id: Option<Uuid>,
}

impl ClientLifecycleOperation {
    /// Create the operation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factory: Arc<dyn ProcessFactory>,
        proxy: Box<dyn ClientProxy>,
        hub: Arc<SignalHub>,
        client_path: PathBuf,
        timeout: Duration,
        kill_attempts: u32,
        kill_pause: Duration,
        headless: bool,
    ) -> Self {
        Self {
            factory,
            proxy: Some(proxy),
            hub,
            client_path,
            timeout,
            kill_attempts,
            kill_pause,
            headless,
            active_client_id: None,
        }
    }

    /// Wait for the client-ready signal, racing against process death.
    fn wait_for_ready(
        &self,
        ready: &lockdown_proxy::SessionSignal,
        process: &dyn ProcessHandle,
    ) -> SpawnWait {
        let deadline = Instant::now() + self.timeout;
        loop {
            if ready.wait(Duration::from_millis(25)) {
                return SpawnWait::Ready;
            }
            if process.has_terminated() {
                return SpawnWait::Died;
            }
            if Instant::now() >= deadline {
                return SpawnWait::Timeout;
            }
        }
    }

    /// Kill the process with bounded retries. Returns `true` once dead.
    fn kill_with_retries(&self, process: &mut Box<dyn ProcessHandle>) -> bool {
        for attempt in 1..=self.kill_attempts {
            if process.try_kill(self.kill_pause) {
                info!("Client process {} killed on attempt {}", process.id(), attempt);
                return true;
            }
            debug!(
                "Kill attempt {}/{} on process {} failed",
                attempt,
                self.kill_attempts,
                process.id()
            );
            if attempt < self.kill_attempts {
                std::thread::sleep(self.kill_pause);
            }
        }
        error!(
            "{}",
            Error::ProcessKill {
                pid: process.id(),
                attempts: self.kill_attempts,
            }
        );
        false
    }

    fn start_client(&mut self, context: &mut SessionContext) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Client lifecycle ran without a pending session");
            return OperationResult::Failed;
        };

        let client_id = next.app_config.client_id;
        let token = next.app_config.authentication_token;
        let args = vec![
            "--token".to_string(),
            token.to_string(),
            "--address".to_string(),
            next.app_config.client_address.clone(),
            "--log-file".to_string(),
            next.app_config.client_log_path.to_string_lossy().into_owned(),
            "--mode".to_string(),
            if self.headless { "window" } else { "kiosk" }.to_string(),
        ];

        let mut process = match self.factory.start_new(&self.client_path, &args) {
            Ok(process) => process,
            Err(e) => {
                error!("Client spawn failed: {}", e);
                return OperationResult::Failed;
            }
        };

        let ready = self.hub.get(&client_ready_signal_name(client_id));
        match self.wait_for_ready(&ready, process.as_ref()) {
            SpawnWait::Ready => {}
            SpawnWait::Died => {
                error!(
                    "Client process {} died before signalling readiness",
                    process.id()
                );
                return OperationResult::Failed;
            }
            SpawnWait::Timeout => {
                error!(
                    "Client did not become ready within {}ms",
                    self.timeout.as_millis()
                );
                self.kill_with_retries(&mut process);
                return OperationResult::Failed;
            }
        }

        let Some(mut proxy) = self.proxy.take() else {
            error!("Client proxy is already in use");
            self.kill_with_retries(&mut process);
            return OperationResult::Failed;
        };

        if let Err(e) = proxy.connect(token) {
            error!("Client proxy connection failed: {}", e);
            self.proxy = Some(proxy);
            self.kill_with_retries(&mut process);
            return OperationResult::Failed;
        }

        match proxy.request_authentication() {
            Ok(auth) if auth.process_id == process.id() => {
                debug!("Client identity verified: pid={}", auth.process_id);
            }
            Ok(auth) => {
                error!(
                    "{}",
                    Error::ClientImpersonation {
                        spawned: process.id(),
                        reported: auth.process_id,
                    }
                );
                let _ = proxy.disconnect();
                self.proxy = Some(proxy);
                self.kill_with_retries(&mut process);
                return OperationResult::Failed;
            }
            Err(e) => {
                error!("Client authentication request failed: {}", e);
                let _ = proxy.disconnect();
                self.proxy = Some(proxy);
                self.kill_with_retries(&mut process);
                return OperationResult::Failed;
            }
        }

        info!("Client started and authenticated: pid={}", process.id());
        self.active_client_id = Some(client_id);
        context.set_client_process(process);
        context.set_client_proxy(proxy);
        OperationResult::Success
    }

    fn stop_client(&mut self, context: &mut SessionContext) -> OperationResult {
        let proxy = context.take_client_proxy();
        let process = context.take_client_process();
        let client_id = self.active_client_id.take();

        if proxy.is_none() && process.is_none() {
            return OperationResult::Success;
        }

        if let Some(mut proxy) = proxy {
            if let Err(e) = proxy.initiate_shutdown() {
                warn!("Client shutdown instruction failed: {}", e);
            }
            if let Err(e) = proxy.disconnect() {
                warn!("Client proxy disconnect failed: {}", e);
            }
            // The connection object outlives the session and is reused
            self.proxy = Some(proxy);
        }

        let half = self.timeout / 2;
        if let Some(client_id) = client_id {
            let disconnected = self.hub.get(&client_disconnected_signal_name(client_id));
            if !disconnected.wait(half) {
                warn!(
                    "Client did not confirm disconnection within {}ms",
                    half.as_millis()
                );
            }
        }

        if let Some(mut process) = process {
            if !process.terminated().wait(half) {
                warn!(
                    "Client process {} still alive after {}ms, escalating",
                    process.id(),
                    half.as_millis()
                );
                if !self.kill_with_retries(&mut process) {
                    return OperationResult::Failed;
                }
            }
        }

        OperationResult::Success
    }
}

impl Operation for ClientLifecycleOperation {
    fn name(&self) -> &'static str {
        "client lifecycle"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.start_client(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult {
        // The client is restarted with the new session's identifiers; a
        // failed teardown blocks the restart
        let stopped = self.revert(context, observer);
        if !stopped.is_success() {
            return stopped;
        }
        self.start_client(context)
    }

    fn revert(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.stop_client(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::NullObserver;
    use crate::testing::{FakeClientProxy, FakeProcessFactory};
    use lockdown_core::{SessionConfiguration, Settings};
    use std::path::Path;
    use std::sync::atomic::Ordering;

    fn context_with_next() -> SessionContext {
        let mut context = SessionContext::new();
        context.set_next(SessionConfiguration::new(
            Settings::default(),
            Path::new("/tmp/lockdown-tests"),
        ));
        context
    }

    fn operation_with(
        factory: FakeProcessFactory,
        proxy: FakeClientProxy,
        hub: Arc<SignalHub>,
        timeout_ms: u64,
    ) -> ClientLifecycleOperation {
        ClientLifecycleOperation::new(
            Arc::new(factory),
            Box::new(proxy),
            hub,
            PathBuf::from("/opt/lockdown/client"),
            Duration::from_millis(timeout_ms),
            2,
            Duration::from_millis(10),
            false,
        )
    }

    #[test]
    fn test_perform_happy_path() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::new();
        let expected_pid = factory.peek_next_pid();
        let proxy = FakeClientProxy::new(expected_pid);
        let proxy_state = proxy.state();
        let spawn_log = factory.spawn_log_handle();

        let mut context = context_with_next();
        let client_id = context.next().unwrap().app_config.client_id;
        let token = context.next().unwrap().app_config.authentication_token;
        hub.get(&client_ready_signal_name(client_id)).raise();

        let mut op = operation_with(factory, proxy, Arc::clone(&hub), 500);
        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        assert!(context.has_client_process());

        let proxy_state = proxy_state.lock().unwrap();
        assert_eq!(proxy_state.connects, vec![token]);
        assert_eq!(proxy_state.auth_requests, 1);

        // The spawn carried the authentication token
        let spawns = spawn_log.lock().unwrap();
        assert_eq!(spawns.len(), 1);
        assert!(spawns[0].1.contains(&token.to_string()));
    }

    #[test]
    fn test_never_ready_kills_and_fails() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::new();
        let proxy = FakeClientProxy::new(factory.peek_next_pid());
        let parts_handle = factory.parts_handle();

        let mut context = context_with_next();
        let mut op = operation_with(factory, proxy, hub, 100);

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Failed);
        assert!(!context.has_client_process());

        // The kill path executed and the process is gone
        let parts = parts_handle.lock().unwrap();
        assert!(parts[0].kill_calls.load(Ordering::SeqCst) >= 1);
        assert!(parts[0].terminated.is_raised());
    }

    #[test]
    fn test_death_before_ready_fails_without_kill() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::dead_on_arrival();
        let proxy = FakeClientProxy::new(factory.peek_next_pid());
        let parts_handle = factory.parts_handle();

        let mut context = context_with_next();
        let mut op = operation_with(factory, proxy, hub, 500);

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Failed);
        let parts = parts_handle.lock().unwrap();
        assert_eq!(parts[0].kill_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pid_mismatch_is_treated_as_impersonation() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::new();
        // A different process asserts the client identity
        let proxy = FakeClientProxy::new(99_999);
        let parts_handle = factory.parts_handle();

        let mut context = context_with_next();
        let client_id = context.next().unwrap().app_config.client_id;
        hub.get(&client_ready_signal_name(client_id)).raise();

        let mut op = operation_with(factory, proxy, Arc::clone(&hub), 500);
        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Failed);
        assert!(!context.has_client_process());
        let parts = parts_handle.lock().unwrap();
        assert!(parts[0].kill_calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_revert_graceful_shutdown() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::new();
        let parts_handle = factory.parts_handle();

        let mut context = context_with_next();
        let client_id = context.next().unwrap().app_config.client_id;
        hub.get(&client_ready_signal_name(client_id)).raise();

        // A cooperative client: disconnects when told to shut down
        let proxy = FakeClientProxy::new(factory.peek_next_pid()).raising_on_shutdown(vec![
            hub.get(&client_disconnected_signal_name(client_id)),
        ]);
        let proxy_state = proxy.state();

        let mut op = operation_with(factory, proxy, Arc::clone(&hub), 500);
        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );

        // The client exits once shutdown is initiated
        parts_handle.lock().unwrap()[0].terminated.raise();

        let result = op.revert(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        assert!(!context.has_client_process());
        let proxy_state = proxy_state.lock().unwrap();
        assert_eq!(proxy_state.shutdowns, 1);
        assert_eq!(proxy_state.disconnects, 1);
        assert_eq!(
            parts_handle.lock().unwrap()[0]
                .kill_calls
                .load(Ordering::SeqCst),
            0
        );
    }

    #[test]
    fn test_revert_escalates_to_kill() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::unkillable();
        let parts_handle = factory.parts_handle();

        let mut context = context_with_next();
        let client_id = context.next().unwrap().app_config.client_id;
        hub.get(&client_ready_signal_name(client_id)).raise();

        let proxy = FakeClientProxy::new(factory.peek_next_pid());
        let mut op = operation_with(factory, proxy, Arc::clone(&hub), 100);
        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );

        // Nothing confirms shutdown; the process survives every attempt
        let result = op.revert(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Failed);
        assert_eq!(
            parts_handle.lock().unwrap()[0]
                .kill_calls
                .load(Ordering::SeqCst),
            2
        );
    }

    #[test]
    fn test_revert_without_perform_is_noop() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::new();
        let proxy = FakeClientProxy::new(4000);
        let proxy_state = proxy.state();

        let mut context = SessionContext::new();
        let mut op = operation_with(factory, proxy, hub, 100);

        assert_eq!(
            op.revert(&mut context, &NullObserver),
            OperationResult::Success
        );
        assert_eq!(proxy_state.lock().unwrap().shutdowns, 0);
    }

    #[test]
    fn test_repeat_restarts_with_fresh_identifiers() {
        let hub = Arc::new(SignalHub::new());
        let factory = FakeProcessFactory::new();
        let parts_handle = factory.parts_handle();
        let spawn_log = factory.spawn_log_handle();

        let mut context = context_with_next();
        let first_client_id = context.next().unwrap().app_config.client_id;
        hub.get(&client_ready_signal_name(first_client_id)).raise();

        let proxy = FakeClientProxy::new(factory.peek_next_pid());
        let pid_cell = proxy.pid_cell();

        let mut op = operation_with(factory, proxy, Arc::clone(&hub), 500);
        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );

        // Reconfigure: fresh pending session with a fresh client id
        let mut reconfigured = context_with_next();
        let second_client_id = reconfigured.next().unwrap().app_config.client_id;
        assert_ne!(first_client_id, second_client_id);

        // The old client cooperates, and the next spawn gets pid 4001
        hub.get(&client_disconnected_signal_name(first_client_id)).raise();
        parts_handle.lock().unwrap()[0].terminated.raise();
        hub.get(&client_ready_signal_name(second_client_id)).raise();
        pid_cell.store(4001, Ordering::SeqCst);

        // Move the stored handles over to the reconfigured context, the way
        // the shared context does in production
        if let Some(process) = context.take_client_process() {
            reconfigured.set_client_process(process);
        }
        if let Some(proxy) = context.take_client_proxy() {
            reconfigured.set_client_proxy(proxy);
        }

        assert_eq!(
            op.repeat(&mut reconfigured, &NullObserver),
            OperationResult::Success
        );
        assert_eq!(spawn_log.lock().unwrap().len(), 2);
        assert!(reconfigured.has_client_process());
    }
}
