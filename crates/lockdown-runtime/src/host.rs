//! The session host - assembles the pipeline and drives it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use lockdown_core::{AppVersion, OperationResult, Result, RuntimeConfig};
use lockdown_detector::{DisplayMonitor, RemoteSessionDetector, VirtualMachineDetector};
use lockdown_proxy::{
    ClientProxy, DesktopFactory, ExamServerProxy, ExplorerShell, ProcessFactory, ServiceProxy,
    SessionSignal, SettingsRepository, SignalHub, UserInteraction,
};
use lockdown_session::ops::{
    ClientLifecycleOperation, ConfigurationResolutionOperation, DisplayConfigurationOperation,
    ExamNegotiationOperation, KioskIsolationOperation, RemoteSessionPolicyOperation,
    ServiceCoordinationOperation, SessionActivationOperation, SessionInitializationOperation,
    VersionRestrictionOperation, VirtualMachinePolicyOperation,
};
use lockdown_session::{NullObserver, Operation, PipelineExecutor, ProgressObserver, SessionContext};

/// Everything the host needs to reach its collaborators.
pub struct HostDependencies {
    /// Settings repository
    pub repository: Arc<dyn SettingsRepository>,
    /// Operator prompt surface
    pub interaction: Arc<dyn UserInteraction>,
    /// Privileged service proxy
    pub service_proxy: Box<dyn ServiceProxy>,
    /// Exam server proxy
    pub exam_proxy: Box<dyn ExamServerProxy>,
    /// Client IPC proxy
    pub client_proxy: Box<dyn ClientProxy>,
    /// Process factory for spawning the client
    pub process_factory: Arc<dyn ProcessFactory>,
    /// Desktop factory for kiosk isolation
    pub desktop_factory: Box<dyn DesktopFactory>,
    /// Explorer shell control for kiosk isolation
    pub shell: Box<dyn ExplorerShell>,
    /// Virtual machine detector
    pub vm_detector: Arc<dyn VirtualMachineDetector>,
    /// Remote session detector
    pub remote_detector: Arc<dyn RemoteSessionDetector>,
    /// Display topology monitor
    pub display_monitor: Arc<dyn DisplayMonitor>,
    /// Signal hub for cross-process synchronization
    pub hub: Arc<SignalHub>,
}

/// Invocation options from the command line.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Settings URI supplied on the command line
    pub settings_uri: Option<String>,
    /// Run the client windowed instead of in kiosk mode
    pub headless: bool,
}

/// Owns the session context and the executor, and exposes the runtime's
/// three verbs: start, reconfigure and stop.
pub struct SessionHost {
    context: SessionContext,
    executor: PipelineExecutor,
    observer: Box<dyn ProgressObserver>,
    final_stop: Arc<AtomicBool>,
}

impl SessionHost {
    /// Assemble the pipeline in its canonical order.
    pub fn new(config: &RuntimeConfig, options: RuntimeOptions, deps: HostDependencies) -> Self {
        let final_stop = Arc::new(AtomicBool::new(false));
        let operator = resolve_operator();
        let installed = installed_version();
        info!(
            "Assembling session pipeline: operator='{}', version={}",
            operator, installed
        );

        let mut operations: Vec<Box<dyn Operation>> = vec![
            Box::new(SessionInitializationOperation::new(Arc::clone(
                &deps.repository,
            ))),
            Box::new(ConfigurationResolutionOperation::new(
                Arc::clone(&deps.repository),
                Arc::clone(&deps.interaction),
                options.settings_uri.clone(),
                config.paths.machine_settings.clone(),
                config.paths.user_settings.clone(),
                config.limits.password_attempts,
            )),
            Box::new(VersionRestrictionOperation::new(installed)),
            Box::new(VirtualMachinePolicyOperation::new(deps.vm_detector)),
            Box::new(RemoteSessionPolicyOperation::new(deps.remote_detector)),
            Box::new(DisplayConfigurationOperation::new(deps.display_monitor)),
            Box::new(ExamNegotiationOperation::new(
                deps.exam_proxy,
                Arc::clone(&deps.interaction),
            )),
            Box::new(ServiceCoordinationOperation::new(
                deps.service_proxy,
                Arc::clone(&deps.hub),
                Duration::from_millis(config.timeouts.service_ms),
                operator,
                Arc::clone(&final_stop),
            )),
            Box::new(KioskIsolationOperation::new(
                deps.desktop_factory,
                deps.shell,
            )),
        ];

        match &config.paths.client_path {
            Some(client_path) => {
                operations.push(Box::new(ClientLifecycleOperation::new(
                    deps.process_factory,
                    deps.client_proxy,
                    Arc::clone(&deps.hub),
                    client_path.clone(),
                    Duration::from_millis(config.timeouts.client_ms),
                    config.limits.kill_attempts,
                    Duration::from_millis(config.limits.kill_retry_pause_ms),
                    options.headless,
                )));
            }
            None => {
                warn!("No client executable configured, sessions run without a client");
            }
        }

        operations.push(Box::new(SessionActivationOperation::new()));

        Self {
            context: SessionContext::new(),
            executor: PipelineExecutor::new(operations),
            observer: Box::new(NullObserver),
            final_stop,
        }
    }

    /// Replace the progress observer (drives the UI busy indicator).
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Whether a session is currently active.
    pub fn has_active_session(&self) -> bool {
        self.context.current().is_some()
    }

    /// Establish a new session.
    ///
    /// On failure or abort the pending configuration is discarded and the
    /// operations that already performed are unwound; an already-active
    /// session is left untouched.
    pub fn start_session(&mut self) -> Result<OperationResult> {
        info!("Starting session establishment");
        let result = self.executor.perform(&mut self.context, self.observer.as_ref());

        if !result.is_success() {
            warn!("Session establishment stopped ({:?}), unwinding", result);
            self.executor
                .revert_performed(&mut self.context, self.observer.as_ref());
            self.context.discard_next();
        }
        Ok(result)
    }

    /// Reconfigure the active session in place.
    ///
    /// Falls back to a fresh establishment when no session is active. On
    /// failure the pending configuration is discarded; the active session
    /// keeps running with its previous configuration.
    pub fn reconfigure(&mut self, uri: Option<String>) -> Result<OperationResult> {
        self.context.set_reconfiguration_uri(uri);

        if self.context.current().is_none() {
            let result = self.start_session();
            self.context.set_reconfiguration_uri(None);
            return result;
        }

        info!("Starting session reconfiguration");
        let result = self.executor.repeat(&mut self.context, self.observer.as_ref());
        if !result.is_success() {
            warn!("Reconfiguration stopped ({:?}), discarding pending session", result);
            self.context.discard_next();
        }
        self.context.set_reconfiguration_uri(None);
        Ok(result)
    }

    /// Tear the active session down, best-effort and total.
    ///
    /// `final_stop` marks the last teardown of the process lifetime; only
    /// that one requests the service's system-configuration restore pass.
    pub fn stop_session(&mut self, final_stop: bool) -> Result<OperationResult> {
        info!("Starting session teardown (final: {})", final_stop);
        self.final_stop.store(final_stop, Ordering::SeqCst);
        let result = self.executor.revert(&mut self.context, self.observer.as_ref());
        self.context.discard_next();
        Ok(result)
    }

    /// Signal raised when the spawned client process terminates, if a
    /// client is currently held.
    pub fn client_terminated_signal(&self) -> Option<SessionSignal> {
        self.context.client_process().map(|p| p.terminated())
    }

    /// URL of the active session's exam server, when in server mode.
    pub fn active_server_url(&self) -> Option<String> {
        let current = self.context.current()?;
        if current.settings.server.url.is_empty() {
            None
        } else {
            Some(current.settings.server.url.clone())
        }
    }
}

/// Operator identity from the environment.
fn resolve_operator() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Version of this build.
fn installed_version() -> AppVersion {
    AppVersion::parse(env!("CARGO_PKG_VERSION")).unwrap_or(AppVersion {
        major: 0,
        minor: 0,
        patch: 0,
        build: None,
        edition: None,
    })
}
