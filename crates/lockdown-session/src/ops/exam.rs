//! Exam negotiation - discovers and selects an exam on a remote server.

use std::sync::Arc;

use tracing::{error, info, warn};

use lockdown_core::{
    KioskMode, OperationResult, Result, ServicePolicy, SessionMode, Settings,
};
use lockdown_proxy::{Exam, ExamServerProxy, ServerFailureAction, UserInteraction};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Outcome of one retry-wrapped server call.
enum RetryOutcome<T> {
    Value(T),
    Abort,
    Fallback,
}

/// Negotiates the exam with a remote server (server-driven sessions only).
///
/// Every remote call is wrapped in the uniform retry protocol: on failure
/// the server's message is surfaced to the operator, who chooses retry,
/// abort or - when enabled - fallback to an unrestricted normal session.
pub struct ExamNegotiationOperation {
    proxy: Box<dyn ExamServerProxy>,
    interaction: Arc<dyn UserInteraction>,
    connected: bool,
}

impl ExamNegotiationOperation {
    /// Create the operation.
    pub fn new(proxy: Box<dyn ExamServerProxy>, interaction: Arc<dyn UserInteraction>) -> Self {
        Self {
            proxy,
            interaction,
            connected: false,
        }
    }

    /// Settings of the unrestricted normal session used as fallback.
    fn fallback_settings() -> Settings {
        let mut settings = Settings::default();
        settings.session_mode = SessionMode::Normal;
        settings.kiosk_mode = KioskMode::None;
        settings.service.policy = ServicePolicy::Ignore;
        settings.display.allowed_display_count = None;
        settings.browser.clear_cache_on_exit = false;
        settings.browser.clear_cookies_on_exit = false;
        settings
    }

    /// Run `call` until it succeeds or the operator stops retrying.
    fn with_retry<T>(
        &mut self,
        label: &str,
        fallback_enabled: bool,
        mut call: impl FnMut(&mut dyn ExamServerProxy) -> Result<T>,
    ) -> RetryOutcome<T> {
        loop {
            match call(self.proxy.as_mut()) {
                Ok(value) => return RetryOutcome::Value(value),
                Err(e) => {
                    warn!("Exam server call '{}' failed: {}", label, e);
                    match self
                        .interaction
                        .server_failure_action(&e.to_string(), fallback_enabled)
                    {
                        ServerFailureAction::Retry => continue,
                        ServerFailureAction::Abort => return RetryOutcome::Abort,
                        ServerFailureAction::Fallback => {
                            if fallback_enabled {
                                return RetryOutcome::Fallback;
                            }
                            warn!("Fallback requested but not enabled, aborting");
                            return RetryOutcome::Abort;
                        }
                    }
                }
            }
        }
    }

    /// Degrade the pending session to an unrestricted normal session.
    fn apply_fallback(&self, context: &mut SessionContext) -> OperationResult {
        info!("Falling back to an unrestricted normal session");
        if let Some(next) = context.next_mut() {
            next.settings = Self::fallback_settings();
        }
        OperationResult::Success
    }

    /// Pick the exam: pre-pinned, sole offer, or operator selection.
    fn select_exam(&self, exams: &[Exam], pinned: Option<&str>) -> Option<String> {
        if let Some(pinned) = pinned {
            return Some(pinned.to_string());
        }
        if exams.len() == 1 {
            return Some(exams[0].id.clone());
        }
        self.interaction.select_exam(exams)
    }

    fn negotiate(&mut self, context: &mut SessionContext) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Exam negotiation ran without a pending session");
            return OperationResult::Failed;
        };

        if next.settings.session_mode != SessionMode::Server {
            return OperationResult::Success;
        }

        let fallback_enabled = next.settings.server.fallback_enabled;
        let pinned = next.settings.server.exam_id.clone();

        match self.with_retry("connect", fallback_enabled, |proxy| proxy.connect()) {
            RetryOutcome::Value(()) => self.connected = true,
            RetryOutcome::Abort => return OperationResult::Aborted,
            RetryOutcome::Fallback => return self.apply_fallback(context),
        }

        let exams = match self.with_retry("list exams", fallback_enabled, |proxy| {
            proxy.available_exams()
        }) {
            RetryOutcome::Value(exams) => exams,
            RetryOutcome::Abort => return OperationResult::Aborted,
            RetryOutcome::Fallback => return self.apply_fallback(context),
        };

        let Some(exam_id) = self.select_exam(&exams, pinned.as_deref()) else {
            info!("Operator cancelled the exam selection");
            return OperationResult::Aborted;
        };
        info!("Exam selected: '{}'", exam_id);

        let exam_settings = match self.with_retry("fetch exam settings", fallback_enabled, {
            let exam_id = exam_id.clone();
            move |proxy| proxy.exam_settings(&exam_id)
        }) {
            RetryOutcome::Value(settings) => settings,
            RetryOutcome::Abort => return OperationResult::Aborted,
            RetryOutcome::Fallback => return self.apply_fallback(context),
        };

        // Merge, preserving the server connection already negotiated
        if let Some(next) = context.next_mut() {
            let server = next.settings.server.clone();
            next.settings = exam_settings;
            next.settings.server = server;
            next.settings.session_mode = SessionMode::Server;
        }

        let key = match self.with_retry("confirm exam", fallback_enabled, {
            let exam_id = exam_id.clone();
            move |proxy| proxy.confirm_exam(&exam_id)
        }) {
            RetryOutcome::Value(key) => key,
            RetryOutcome::Abort => return OperationResult::Aborted,
            RetryOutcome::Fallback => return self.apply_fallback(context),
        };

        if let Some(next) = context.next_mut() {
            next.browser_exam_key = Some(key);
        }
        OperationResult::Success
    }

    fn teardown(&mut self) -> OperationResult {
        if !self.connected {
            return OperationResult::Success;
        }
        self.connected = false;
        match self.proxy.disconnect() {
            Ok(()) => OperationResult::Success,
            Err(e) => {
                warn!("Exam server disconnect failed: {}", e);
                OperationResult::Failed
            }
        }
    }
}

impl Operation for ExamNegotiationOperation {
    fn name(&self) -> &'static str {
        "exam negotiation"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.negotiate(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        observer: &dyn ProgressObserver,
    ) -> OperationResult {
        // Revert-then-perform; switching on top of a failed teardown is not
        // attempted
        let reverted = self.revert(context, observer);
        if !reverted.is_success() {
            return reverted;
        }
        self.negotiate(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.teardown()
    }
}
