//! Kiosk isolation - switches the interactive desktop into an isolated mode
//! and back.

use tracing::{error, info, warn};

use lockdown_core::{KioskMode, OperationResult};
use lockdown_proxy::{Desktop, DesktopFactory, ExplorerShell};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// State machine over the kiosk modes.
///
/// `perform` enters the pending session's target mode, `repeat` switches
/// modes only when the target differs from the active one, `revert` always
/// returns to the original desktop and shell. Switching fully unwinds the
/// old mode before entering the new one; an isolated desktop coexisting with
/// a terminated shell would violate the state machine.
pub struct KioskIsolationOperation {
    desktop_factory: Box<dyn DesktopFactory>,
    shell: Box<dyn ExplorerShell>,
    active_mode: KioskMode,
    original_desktop: Option<Box<dyn Desktop>>,
    isolated_desktop: Option<Box<dyn Desktop>>,
}

impl KioskIsolationOperation {
    /// Create the operation; no isolation is active initially.
    pub fn new(
        desktop_factory: Box<dyn DesktopFactory>,
        shell: Box<dyn ExplorerShell>,
    ) -> Self {
        Self {
            desktop_factory,
            shell,
            active_mode: KioskMode::None,
            original_desktop: None,
            isolated_desktop: None,
        }
    }

    /// The currently active kiosk mode.
    pub fn active_mode(&self) -> KioskMode {
        self.active_mode
    }

    fn enter(&mut self, mode: KioskMode) -> OperationResult {
        match mode {
            KioskMode::None => {}
            KioskMode::CreateNewDesktop => {
                let original = match self.desktop_factory.get_current() {
                    Ok(desktop) => desktop,
                    Err(e) => {
                        error!("Cannot determine the current desktop: {}", e);
                        return OperationResult::Failed;
                    }
                };
                let isolated = match self.desktop_factory.create_random() {
                    Ok(desktop) => desktop,
                    Err(e) => {
                        error!("Cannot create an isolated desktop: {}", e);
                        return OperationResult::Failed;
                    }
                };
                if let Err(e) = isolated.activate() {
                    error!("Cannot activate desktop '{}': {}", isolated.name(), e);
                    return OperationResult::Failed;
                }
                info!(
                    "Switched to isolated desktop '{}' (original: '{}')",
                    isolated.name(),
                    original.name()
                );
                self.original_desktop = Some(original);
                self.isolated_desktop = Some(isolated);
            }
            KioskMode::DisableExplorerShell => {
                if let Err(e) = self.shell.hide_all_windows() {
                    error!("Cannot hide shell windows: {}", e);
                    return OperationResult::Failed;
                }
                if let Err(e) = self.shell.terminate() {
                    error!("Cannot terminate the shell: {}", e);
                    return OperationResult::Failed;
                }
                info!("Shell suspended for kiosk isolation");
            }
        }

        self.active_mode = mode;
        OperationResult::Success
    }

    /// Unwind the active mode. With `strict`, the first error fails the
    /// unwind; without, errors are logged and the unwind completes anyway.
    fn leave(&mut self, strict: bool) -> OperationResult {
        let mode = self.active_mode;
        match mode {
            KioskMode::None => {}
            KioskMode::CreateNewDesktop => {
                match self.original_desktop.take() {
                    Some(original) => {
                        if let Err(e) = original.activate() {
                            if strict {
                                error!(
                                    "Cannot restore desktop '{}': {}",
                                    original.name(),
                                    e
                                );
                                return OperationResult::Failed;
                            }
                            warn!("Restoring desktop '{}' failed: {}", original.name(), e);
                        }
                    }
                    None => warn!("No original desktop recorded, nothing to restore"),
                }
                match self.isolated_desktop.take() {
                    Some(isolated) => {
                        if let Err(e) = isolated.close() {
                            if strict {
                                error!(
                                    "Cannot close desktop '{}': {}",
                                    isolated.name(),
                                    e
                                );
                                return OperationResult::Failed;
                            }
                            warn!("Closing desktop '{}' failed: {}", isolated.name(), e);
                        }
                    }
                    None => warn!("No isolated desktop recorded, nothing to close"),
                }
            }
            KioskMode::DisableExplorerShell => {
                if let Err(e) = self.shell.start() {
                    if strict {
                        error!("Cannot restart the shell: {}", e);
                        return OperationResult::Failed;
                    }
                    warn!("Restarting the shell failed: {}", e);
                }
                if let Err(e) = self.shell.restore_all_windows() {
                    if strict {
                        error!("Cannot restore shell windows: {}", e);
                        return OperationResult::Failed;
                    }
                    warn!("Restoring shell windows failed: {}", e);
                }
            }
        }

        self.active_mode = KioskMode::None;
        OperationResult::Success
    }
}

impl Operation for KioskIsolationOperation {
    fn name(&self) -> &'static str {
        "kiosk isolation"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Kiosk isolation ran without a pending session");
            return OperationResult::Failed;
        };
        self.enter(next.settings.kiosk_mode)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        let Some(next) = context.next() else {
            error!("Kiosk isolation ran without a pending session");
            return OperationResult::Failed;
        };
        let target = next.settings.kiosk_mode;

        if target == self.active_mode {
            info!("Kiosk mode unchanged ({:?}), nothing to switch", target);
            return OperationResult::Success;
        }

        // Fully unwind the old mode before entering the new one
        let left = self.leave(true);
        if !left.is_success() {
            return left;
        }
        self.enter(target)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.leave(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::NullObserver;
    use crate::testing::{RecordingDesktopFactory, RecordingShell};
    use lockdown_core::{SessionConfiguration, Settings};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn context_with_mode(mode: KioskMode) -> SessionContext {
        let mut settings = Settings::default();
        settings.kiosk_mode = mode;
        let mut context = SessionContext::new();
        context.set_next(SessionConfiguration::new(
            settings,
            Path::new("/tmp/lockdown-tests"),
        ));
        context
    }

    fn operation_with(
        factory: RecordingDesktopFactory,
        shell: RecordingShell,
    ) -> (
        KioskIsolationOperation,
        Arc<Mutex<crate::testing::DesktopState>>,
        Arc<Mutex<crate::testing::ShellState>>,
    ) {
        let desktop_state = factory.state();
        let shell_state = shell.state();
        let operation = KioskIsolationOperation::new(Box::new(factory), Box::new(shell));
        (operation, desktop_state, shell_state)
    }

    #[test]
    fn test_perform_new_desktop_activates_isolated() {
        let (mut op, desktop_state, _) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());
        let mut context = context_with_mode(KioskMode::CreateNewDesktop);

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        assert_eq!(op.active_mode(), KioskMode::CreateNewDesktop);
        let state = desktop_state.lock().unwrap();
        assert_eq!(state.created.len(), 1);
        assert_eq!(state.active, state.created[0]);
    }

    #[test]
    fn test_perform_disable_shell_hides_then_terminates() {
        let (mut op, _, shell_state) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());
        let mut context = context_with_mode(KioskMode::DisableExplorerShell);

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        let state = shell_state.lock().unwrap();
        assert!(!state.running);
        assert!(state.hidden);
        assert_eq!(state.transitions, vec!["hide", "terminate"]);
    }

    #[test]
    fn test_perform_none_changes_nothing() {
        let (mut op, desktop_state, shell_state) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());
        let mut context = context_with_mode(KioskMode::None);

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );
        assert_eq!(desktop_state.lock().unwrap().created.len(), 0);
        assert!(shell_state.lock().unwrap().running);
    }

    #[test]
    fn test_repeat_same_mode_is_noop() {
        let (mut op, desktop_state, _) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());
        let mut context = context_with_mode(KioskMode::CreateNewDesktop);
        op.perform(&mut context, &NullObserver);

        let mut reconfigured = context_with_mode(KioskMode::CreateNewDesktop);
        assert_eq!(
            op.repeat(&mut reconfigured, &NullObserver),
            OperationResult::Success
        );

        // No second desktop was created
        assert_eq!(desktop_state.lock().unwrap().created.len(), 1);
    }

    #[test]
    fn test_repeat_switch_fully_unwinds_old_mode() {
        let (mut op, desktop_state, shell_state) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());

        let mut context = context_with_mode(KioskMode::CreateNewDesktop);
        op.perform(&mut context, &NullObserver);

        let mut reconfigured = context_with_mode(KioskMode::DisableExplorerShell);
        assert_eq!(
            op.repeat(&mut reconfigured, &NullObserver),
            OperationResult::Success
        );

        // Desktop mode is fully unwound: original active again, isolated closed
        let desktops = desktop_state.lock().unwrap();
        assert_eq!(desktops.active, "default");
        assert_eq!(desktops.closed.len(), 1);

        // Shell mode is now in effect
        let shell = shell_state.lock().unwrap();
        assert!(!shell.running);
        assert_eq!(op.active_mode(), KioskMode::DisableExplorerShell);
    }

    #[test]
    fn test_perform_switch_revert_restores_initial_state() {
        let (mut op, desktop_state, shell_state) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());

        let mut context = context_with_mode(KioskMode::CreateNewDesktop);
        op.perform(&mut context, &NullObserver);

        let mut switched = context_with_mode(KioskMode::DisableExplorerShell);
        op.repeat(&mut switched, &NullObserver);

        assert_eq!(
            op.revert(&mut switched, &NullObserver),
            OperationResult::Success
        );

        // Back to the pre-perform state on both axes
        assert_eq!(op.active_mode(), KioskMode::None);
        let desktops = desktop_state.lock().unwrap();
        assert_eq!(desktops.active, "default");
        let shell = shell_state.lock().unwrap();
        assert!(shell.running);
        assert!(!shell.hidden);
    }

    #[test]
    fn test_revert_without_perform_is_noop() {
        let (mut op, desktop_state, shell_state) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());
        let mut context = SessionContext::new();

        assert_eq!(
            op.revert(&mut context, &NullObserver),
            OperationResult::Success
        );
        assert_eq!(desktop_state.lock().unwrap().closed.len(), 0);
        assert!(shell_state.lock().unwrap().transitions.is_empty());
    }

    #[test]
    fn test_revert_shell_mode_starts_then_restores() {
        let (mut op, _, shell_state) =
            operation_with(RecordingDesktopFactory::new(), RecordingShell::new());
        let mut context = context_with_mode(KioskMode::DisableExplorerShell);
        op.perform(&mut context, &NullObserver);

        op.revert(&mut context, &NullObserver);

        let state = shell_state.lock().unwrap();
        assert!(state.running);
        assert!(!state.hidden);
        assert_eq!(
            state.transitions,
            vec!["hide", "terminate", "start", "restore"]
        );
    }
}
