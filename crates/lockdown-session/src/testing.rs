//! Scripted collaborator fakes for operation and pipeline tests.
//!
//! Every fake exposes its observable state through shared handles so tests
//! keep visibility after moving the fake into an operation.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use lockdown_core::{
    Error, LoadStatus, OperationResult, PasswordParameters, Result, SaveStatus,
    SessionConfiguration, SessionId, Settings,
};
use lockdown_detector::{RemoteSessionDetector, VirtualMachineDetector};
use lockdown_proxy::repository::LoadOutcome;
use lockdown_proxy::service::session_event_name;
use lockdown_proxy::{
    ClientAuthentication, ClientProxy, Desktop, DesktopFactory, Exam, ExamServerProxy,
    ExplorerShell, ProcessFactory, ProcessHandle, ServerFailureAction, ServiceProxy,
    SessionSignal, SettingsRepository, SignalHub, StartSessionCommand, UserInteraction,
    PasswordPurpose,
};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

// ---------------------------------------------------------------------------
// Executor fakes
// ---------------------------------------------------------------------------

/// Operation returning scripted results and recording its invocations.
pub struct ScriptedOperation {
    name: &'static str,
    perform_result: OperationResult,
    revert_result: OperationResult,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOperation {
    /// An operation whose verbs all succeed.
    pub fn succeeding(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            perform_result: OperationResult::Success,
            revert_result: OperationResult::Success,
            log,
        }
    }

    /// An operation whose perform/repeat fail.
    pub fn failing(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            perform_result: OperationResult::Failed,
            ..Self::succeeding(name, log)
        }
    }

    /// An operation whose perform/repeat abort.
    pub fn aborting(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            perform_result: OperationResult::Aborted,
            ..Self::succeeding(name, log)
        }
    }

    /// An operation that performs fine but fails to revert.
    pub fn failing_revert(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            revert_result: OperationResult::Failed,
            ..Self::succeeding(name, log)
        }
    }

    /// The shared invocation log.
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }
}

impl Operation for ScriptedOperation {
    fn name(&self) -> &'static str {
        self.name
    }

    fn perform(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.log
            .lock()
            .unwrap()
            .push(format!("perform {}", self.name));
        self.perform_result
    }

    fn repeat(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.log
            .lock()
            .unwrap()
            .push(format!("repeat {}", self.name));
        self.perform_result
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.log
            .lock()
            .unwrap()
            .push(format!("revert {}", self.name));
        self.revert_result
    }
}

/// Observer recording every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    statuses: Mutex<Vec<String>>,
    ticks: AtomicU32,
}

impl RecordingObserver {
    /// Create an empty observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// All status lines received, in order.
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    /// Number of progress ticks received.
    pub fn tick_count(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_status(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }

    fn on_progress(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Repository / interaction fakes
// ---------------------------------------------------------------------------

/// One recorded `try_load_settings` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCall {
    /// The URI that was requested
    pub uri: String,
    /// Whether a password was supplied, and whether it was already a hash
    pub password: Option<bool>,
}

/// Repository returning scripted load outcomes.
pub struct ScriptedRepository {
    responses: Mutex<VecDeque<(LoadStatus, Option<Settings>)>>,
    save_statuses: Mutex<VecDeque<SaveStatus>>,
    defaults: Settings,
    session_configuration: Option<SessionConfiguration>,
    load_calls: Arc<Mutex<Vec<LoadCall>>>,
    configure_calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRepository {
    /// A repository that answers every load with the built-in defaults.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            save_statuses: Mutex::new(VecDeque::new()),
            defaults: Settings::default(),
            session_configuration: None,
            load_calls: Arc::new(Mutex::new(Vec::new())),
            configure_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Hand out a fixed session configuration instead of a generated one,
    /// so tests know identifiers in advance.
    pub fn with_session_configuration(mut self, configuration: SessionConfiguration) -> Self {
        self.session_configuration = Some(configuration);
        self
    }

    /// Queue load responses, consumed one per `try_load_settings` call.
    pub fn with_load_responses(
        mut self,
        responses: Vec<(LoadStatus, Option<Settings>)>,
    ) -> Self {
        self.responses = Mutex::new(responses.into());
        self
    }

    /// Queue write-back statuses, consumed one per `configure_client_with`.
    pub fn with_save_statuses(mut self, statuses: Vec<SaveStatus>) -> Self {
        self.save_statuses = Mutex::new(statuses.into());
        self
    }

    /// Override the built-in default settings.
    pub fn with_defaults(mut self, defaults: Settings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Shared record of load calls.
    pub fn load_calls(&self) -> Arc<Mutex<Vec<LoadCall>>> {
        Arc::clone(&self.load_calls)
    }

    /// Shared record of configure calls (the URIs written back).
    pub fn configure_calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.configure_calls)
    }
}

impl Default for ScriptedRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsRepository for ScriptedRepository {
    fn try_load_settings(
        &self,
        uri: &str,
        password: Option<&PasswordParameters>,
    ) -> Result<LoadOutcome> {
        self.load_calls.lock().unwrap().push(LoadCall {
            uri: uri.to_string(),
            password: password.map(|p| p.is_hash),
        });

        let response = self.responses.lock().unwrap().pop_front();
        match response {
            Some((status, settings)) => Ok(LoadOutcome { status, settings }),
            None => Ok(LoadOutcome {
                status: LoadStatus::Success,
                settings: Some(self.defaults.clone()),
            }),
        }
    }

    fn configure_client_with(
        &self,
        uri: &str,
        _password: &PasswordParameters,
    ) -> Result<SaveStatus> {
        self.configure_calls.lock().unwrap().push(uri.to_string());
        Ok(self
            .save_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SaveStatus::Success))
    }

    fn initialize_session_configuration(&self) -> SessionConfiguration {
        match &self.session_configuration {
            Some(configuration) => configuration.clone(),
            None => {
                SessionConfiguration::new(self.defaults.clone(), Path::new("/tmp/lockdown-tests"))
            }
        }
    }

    fn load_default_settings(&self) -> Settings {
        self.defaults.clone()
    }
}

/// Interaction surface answering prompts from scripted queues.
#[derive(Default)]
pub struct ScriptedInteraction {
    passwords: Mutex<VecDeque<Option<String>>>,
    exam_selections: Mutex<VecDeque<Option<String>>>,
    failure_actions: Mutex<VecDeque<ServerFailureAction>>,
    confirmations: Mutex<VecDeque<bool>>,
    messages: Mutex<Vec<String>>,
    password_requests: AtomicU32,
}

impl ScriptedInteraction {
    /// An interaction surface cancelling every prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue password prompt answers (None = operator cancelled).
    pub fn with_passwords(self, passwords: Vec<Option<&str>>) -> Self {
        *self.passwords.lock().unwrap() = passwords
            .into_iter()
            .map(|p| p.map(str::to_string))
            .collect();
        self
    }

    /// Queue exam selections.
    pub fn with_exam_selections(self, selections: Vec<Option<&str>>) -> Self {
        *self.exam_selections.lock().unwrap() = selections
            .into_iter()
            .map(|s| s.map(str::to_string))
            .collect();
        self
    }

    /// Queue server-failure decisions.
    pub fn with_failure_actions(self, actions: Vec<ServerFailureAction>) -> Self {
        *self.failure_actions.lock().unwrap() = actions.into();
        self
    }

    /// Queue yes/no answers.
    pub fn with_confirmations(self, answers: Vec<bool>) -> Self {
        *self.confirmations.lock().unwrap() = answers.into();
        self
    }

    /// How many passwords were requested.
    pub fn password_request_count(&self) -> u32 {
        self.password_requests.load(Ordering::SeqCst)
    }

    /// All messages shown.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl UserInteraction for ScriptedInteraction {
    fn request_password(&self, _purpose: PasswordPurpose) -> Option<String> {
        self.password_requests.fetch_add(1, Ordering::SeqCst);
        self.passwords.lock().unwrap().pop_front().flatten()
    }

    fn select_exam(&self, _exams: &[Exam]) -> Option<String> {
        self.exam_selections.lock().unwrap().pop_front().flatten()
    }

    fn server_failure_action(
        &self,
        _message: &str,
        _fallback_enabled: bool,
    ) -> ServerFailureAction {
        self.failure_actions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ServerFailureAction::Abort)
    }

    fn confirm(&self, _message: &str) -> bool {
        self.confirmations.lock().unwrap().pop_front().unwrap_or(false)
    }

    fn show_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Service proxy fake
// ---------------------------------------------------------------------------

/// Observable state of a [`FakeServiceProxy`].
#[derive(Debug, Default)]
pub struct ServiceProxyState {
    /// Whether the proxy is connected
    pub connected: bool,
    /// Session ids of start commands received
    pub starts: Vec<SessionId>,
    /// Session ids of stop commands received
    pub stops: Vec<SessionId>,
    /// Number of restore passes requested
    pub restores: u32,
    /// Number of disconnects
    pub disconnects: u32,
}

/// Service proxy raising the session event for every accepted command.
pub struct FakeServiceProxy {
    state: Arc<Mutex<ServiceProxyState>>,
    hub: Arc<SignalHub>,
    fail_connect: bool,
    raise_events: bool,
}

impl FakeServiceProxy {
    /// A proxy that connects and confirms every command via the hub.
    pub fn new(hub: Arc<SignalHub>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServiceProxyState::default())),
            hub,
            fail_connect: false,
            raise_events: true,
        }
    }

    /// Make `connect` fail (service unavailable).
    pub fn unavailable(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Accept commands but never raise the session event (lockdown stuck).
    pub fn silent(mut self) -> Self {
        self.raise_events = false;
        self
    }

    /// Shared observable state.
    pub fn state(&self) -> Arc<Mutex<ServiceProxyState>> {
        Arc::clone(&self.state)
    }
}

impl ServiceProxy for FakeServiceProxy {
    fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(Error::ServiceUnavailable("connection refused".to_string()));
        }
        self.state.lock().unwrap().connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn start_session(&mut self, command: &StartSessionCommand) -> Result<()> {
        self.state.lock().unwrap().starts.push(command.session_id);
        if self.raise_events {
            self.hub.get(&session_event_name(command.session_id)).raise();
        }
        Ok(())
    }

    fn stop_session(&mut self, session_id: SessionId) -> Result<()> {
        self.state.lock().unwrap().stops.push(session_id);
        if self.raise_events {
            self.hub.get(&session_event_name(session_id)).raise();
        }
        Ok(())
    }

    fn request_system_restore(&mut self) -> Result<()> {
        self.state.lock().unwrap().restores += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Client proxy fake
// ---------------------------------------------------------------------------

/// Observable state of a [`FakeClientProxy`].
#[derive(Debug, Default)]
pub struct ClientProxyState {
    /// Tokens passed to `connect`
    pub connects: Vec<Uuid>,
    /// Number of authentication requests
    pub auth_requests: u32,
    /// Number of shutdown instructions
    pub shutdowns: u32,
    /// Number of disconnects
    pub disconnects: u32,
}

/// Client proxy asserting a configurable process id.
pub struct FakeClientProxy {
    state: Arc<Mutex<ClientProxyState>>,
    reported_pid: Arc<AtomicU32>,
    fail_connect: bool,
    raise_on_shutdown: Vec<SessionSignal>,
}

impl FakeClientProxy {
    /// A proxy whose identity assertion reports `reported_pid`.
    pub fn new(reported_pid: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClientProxyState::default())),
            reported_pid: Arc::new(AtomicU32::new(reported_pid)),
            fail_connect: false,
            raise_on_shutdown: Vec::new(),
        }
    }

    /// Shared cell holding the pid the next assertion reports.
    pub fn pid_cell(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.reported_pid)
    }

    /// Make `connect` fail.
    pub fn refusing(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Raise these signals when a shutdown is initiated (a cooperative
    /// client dying and disconnecting on request).
    pub fn raising_on_shutdown(mut self, signals: Vec<SessionSignal>) -> Self {
        self.raise_on_shutdown = signals;
        self
    }

    /// Shared observable state.
    pub fn state(&self) -> Arc<Mutex<ClientProxyState>> {
        Arc::clone(&self.state)
    }
}

impl ClientProxy for FakeClientProxy {
    fn connect(&mut self, token: Uuid) -> Result<()> {
        self.state.lock().unwrap().connects.push(token);
        if self.fail_connect {
            return Err(Error::ProxyConnection("client refused".to_string()));
        }
        Ok(())
    }

    fn request_authentication(&mut self) -> Result<ClientAuthentication> {
        self.state.lock().unwrap().auth_requests += 1;
        Ok(ClientAuthentication {
            process_id: self.reported_pid.load(Ordering::SeqCst),
        })
    }

    fn initiate_shutdown(&mut self) -> Result<()> {
        self.state.lock().unwrap().shutdowns += 1;
        for signal in &self.raise_on_shutdown {
            signal.raise();
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.state.lock().unwrap().disconnects += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Process fakes
// ---------------------------------------------------------------------------

/// Observable parts of one spawned fake process.
pub struct FakeProcessParts {
    /// Assigned process id
    pub pid: u32,
    /// Signal raised when the fake process "exits"
    pub terminated: SessionSignal,
    /// Number of kill attempts made against this process
    pub kill_calls: AtomicU32,
}

/// Process factory spawning inert fake processes with sequential pids.
pub struct FakeProcessFactory {
    parts: Arc<Mutex<Vec<Arc<FakeProcessParts>>>>,
    spawn_log: Arc<Mutex<Vec<(PathBuf, Vec<String>)>>>,
    next_pid: AtomicU32,
    kill_succeeds: bool,
    dead_on_arrival: bool,
}

impl FakeProcessFactory {
    /// A factory whose processes die when killed.
    pub fn new() -> Self {
        Self {
            parts: Arc::new(Mutex::new(Vec::new())),
            spawn_log: Arc::new(Mutex::new(Vec::new())),
            next_pid: AtomicU32::new(4000),
            kill_succeeds: true,
            dead_on_arrival: false,
        }
    }

    /// A factory whose processes survive every kill attempt.
    pub fn unkillable() -> Self {
        Self {
            kill_succeeds: false,
            ..Self::new()
        }
    }

    /// A factory whose processes exit immediately after spawning.
    pub fn dead_on_arrival() -> Self {
        Self {
            dead_on_arrival: true,
            ..Self::new()
        }
    }

    /// Shared handle to the parts of every spawned process, in spawn order.
    pub fn parts_handle(&self) -> Arc<Mutex<Vec<Arc<FakeProcessParts>>>> {
        Arc::clone(&self.parts)
    }

    /// Shared handle to the spawn log (path, args) in order.
    pub fn spawn_log_handle(&self) -> Arc<Mutex<Vec<(PathBuf, Vec<String>)>>> {
        Arc::clone(&self.spawn_log)
    }

    /// The pid the next spawn will be assigned.
    pub fn peek_next_pid(&self) -> u32 {
        self.next_pid.load(Ordering::SeqCst)
    }
}

impl Default for FakeProcessFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessFactory for FakeProcessFactory {
    fn start_new(&self, path: &Path, args: &[String]) -> Result<Box<dyn ProcessHandle>> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawn_log
            .lock()
            .unwrap()
            .push((path.to_path_buf(), args.to_vec()));

        let parts = Arc::new(FakeProcessParts {
            pid,
            terminated: SessionSignal::new(format!("fake-process-terminated-{pid}")),
            kill_calls: AtomicU32::new(0),
        });
        if self.dead_on_arrival {
            parts.terminated.raise();
        }
        self.parts.lock().unwrap().push(Arc::clone(&parts));

        Ok(Box::new(FakeProcessHandle {
            parts,
            kill_succeeds: self.kill_succeeds,
        }))
    }
}

struct FakeProcessHandle {
    parts: Arc<FakeProcessParts>,
    kill_succeeds: bool,
}

impl ProcessHandle for FakeProcessHandle {
    fn id(&self) -> u32 {
        self.parts.pid
    }

    fn has_terminated(&self) -> bool {
        self.parts.terminated.is_raised()
    }

    fn terminated(&self) -> SessionSignal {
        self.parts.terminated.clone()
    }

    fn try_kill(&mut self, _timeout: Duration) -> bool {
        self.parts.kill_calls.fetch_add(1, Ordering::SeqCst);
        if self.kill_succeeds {
            self.parts.terminated.raise();
        }
        self.has_terminated()
    }
}

// ---------------------------------------------------------------------------
// Exam server fake
// ---------------------------------------------------------------------------

/// Observable state of a [`ScriptedExamProxy`].
#[derive(Debug, Default)]
pub struct ExamProxyState {
    /// Number of connect calls
    pub connects: u32,
    /// Number of exam list calls
    pub exam_lists: u32,
    /// Number of settings fetches
    pub settings_fetches: u32,
    /// Exam ids confirmed
    pub confirmed: Vec<String>,
    /// Number of disconnects
    pub disconnects: u32,
}

/// Exam server proxy answering from scripted queues.
///
/// Exhausted queues answer with benign defaults so tests only script the
/// calls they care about.
pub struct ScriptedExamProxy {
    state: Arc<Mutex<ExamProxyState>>,
    connect_results: Mutex<VecDeque<Result<()>>>,
    exam_list_results: Mutex<VecDeque<Result<Vec<Exam>>>>,
    settings_results: Mutex<VecDeque<Result<Settings>>>,
    confirm_results: Mutex<VecDeque<Result<String>>>,
}

impl ScriptedExamProxy {
    /// A proxy answering every call successfully with defaults.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ExamProxyState::default())),
            connect_results: Mutex::new(VecDeque::new()),
            exam_list_results: Mutex::new(VecDeque::new()),
            settings_results: Mutex::new(VecDeque::new()),
            confirm_results: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue connect outcomes.
    pub fn with_connect_results(self, results: Vec<Result<()>>) -> Self {
        *self.connect_results.lock().unwrap() = results.into();
        self
    }

    /// Queue exam list outcomes.
    pub fn with_exam_lists(self, results: Vec<Result<Vec<Exam>>>) -> Self {
        *self.exam_list_results.lock().unwrap() = results.into();
        self
    }

    /// Queue settings fetch outcomes.
    pub fn with_settings_results(self, results: Vec<Result<Settings>>) -> Self {
        *self.settings_results.lock().unwrap() = results.into();
        self
    }

    /// Queue confirmation outcomes.
    pub fn with_confirm_results(self, results: Vec<Result<String>>) -> Self {
        *self.confirm_results.lock().unwrap() = results.into();
        self
    }

    /// Shared observable state.
    pub fn state(&self) -> Arc<Mutex<ExamProxyState>> {
        Arc::clone(&self.state)
    }

    /// A single sample exam.
    pub fn sample_exam(id: &str) -> Exam {
        Exam {
            id: id.to_string(),
            name: format!("Exam {id}"),
            url: format!("https://exam.example.org/{id}"),
        }
    }
}

impl Default for ScriptedExamProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamServerProxy for ScriptedExamProxy {
    fn connect(&mut self) -> Result<()> {
        self.state.lock().unwrap().connects += 1;
        self.connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn disconnect(&mut self) -> Result<()> {
        self.state.lock().unwrap().disconnects += 1;
        Ok(())
    }

    fn available_exams(&mut self) -> Result<Vec<Exam>> {
        self.state.lock().unwrap().exam_lists += 1;
        self.exam_list_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![Self::sample_exam("exam-1")]))
    }

    fn exam_settings(&mut self, _exam_id: &str) -> Result<Settings> {
        self.state.lock().unwrap().settings_fetches += 1;
        self.settings_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Settings::default()))
    }

    fn confirm_exam(&mut self, exam_id: &str) -> Result<String> {
        self.state.lock().unwrap().confirmed.push(exam_id.to_string());
        self.confirm_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("browser-exam-key".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Detector fakes
// ---------------------------------------------------------------------------

/// Virtual machine detector with a fixed answer.
#[derive(Debug)]
pub struct BoolVmDetector(pub bool);

impl VirtualMachineDetector for BoolVmDetector {
    fn is_virtual_machine(&self) -> bool {
        self.0
    }
}

/// Remote session detector with a fixed answer.
#[derive(Debug)]
pub struct BoolRemoteDetector(pub bool);

impl RemoteSessionDetector for BoolRemoteDetector {
    fn is_remote_session(&self) -> bool {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Desktop / shell fakes
// ---------------------------------------------------------------------------

/// Observable state of a [`RecordingDesktopFactory`].
#[derive(Debug, Default)]
pub struct DesktopState {
    /// Name of the currently active desktop
    pub active: String,
    /// Names of desktops created, in order
    pub created: Vec<String>,
    /// Names of desktops closed, in order
    pub closed: Vec<String>,
}

/// Desktop factory recording activations, creations and closes.
pub struct RecordingDesktopFactory {
    state: Arc<Mutex<DesktopState>>,
    counter: AtomicU32,
}

impl RecordingDesktopFactory {
    /// A factory whose current desktop is named `"default"`.
    pub fn new() -> Self {
        let state = DesktopState {
            active: "default".to_string(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            counter: AtomicU32::new(0),
        }
    }

    /// Shared observable state.
    pub fn state(&self) -> Arc<Mutex<DesktopState>> {
        Arc::clone(&self.state)
    }
}

impl Default for RecordingDesktopFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopFactory for RecordingDesktopFactory {
    fn get_current(&self) -> Result<Box<dyn Desktop>> {
        let name = self.state.lock().unwrap().active.clone();
        Ok(Box::new(RecordingDesktop {
            name,
            state: Arc::clone(&self.state),
        }))
    }

    fn create_random(&self) -> Result<Box<dyn Desktop>> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        let name = format!("isolated-{index}");
        self.state.lock().unwrap().created.push(name.clone());
        Ok(Box::new(RecordingDesktop {
            name,
            state: Arc::clone(&self.state),
        }))
    }
}

struct RecordingDesktop {
    name: String,
    state: Arc<Mutex<DesktopState>>,
}

impl Desktop for RecordingDesktop {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self) -> Result<()> {
        self.state.lock().unwrap().active = self.name.clone();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed.push(self.name.clone());
        Ok(())
    }
}

/// Observable state of a [`RecordingShell`].
#[derive(Debug)]
pub struct ShellState {
    /// Whether the shell is running
    pub running: bool,
    /// Whether windows are hidden
    pub hidden: bool,
    /// State transitions, in order
    pub transitions: Vec<String>,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            running: true,
            hidden: false,
            transitions: Vec::new(),
        }
    }
}

/// Shell control recording every transition.
#[derive(Default)]
pub struct RecordingShell {
    state: Arc<Mutex<ShellState>>,
}

impl RecordingShell {
    /// A stand-in for a running, visible shell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared observable state.
    pub fn state(&self) -> Arc<Mutex<ShellState>> {
        Arc::clone(&self.state)
    }
}

impl ExplorerShell for RecordingShell {
    fn hide_all_windows(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.hidden = true;
        state.transitions.push("hide".to_string());
        Ok(())
    }

    fn restore_all_windows(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.hidden = false;
        state.transitions.push("restore".to_string());
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.running = false;
        state.transitions.push("terminate".to_string());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.running = true;
        state.transitions.push("start".to_string());
        Ok(())
    }
}
