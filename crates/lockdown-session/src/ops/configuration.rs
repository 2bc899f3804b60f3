//! Configuration resolution - locates, decrypts and applies the settings
//! source for the pending session.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use lockdown_core::{LoadStatus, OperationResult, PasswordParameters, SaveStatus, Settings};
use lockdown_proxy::{PasswordPurpose, SettingsRepository, UserInteraction};

use crate::context::SessionContext;
use crate::operation::{Operation, ProgressObserver};

/// Outcome of the password-gated load loop.
enum LoadResult {
    Loaded(Settings),
    Browser,
    Abort,
    Fail,
}

/// Resolves the settings source for the pending session and loads it.
///
/// Source precedence (highest first): reconfiguration request URI (repeat
/// only) - command-line URI - machine-wide settings file - per-user settings
/// file - built-in defaults.
pub struct ConfigurationResolutionOperation {
    repository: Arc<dyn SettingsRepository>,
    interaction: Arc<dyn UserInteraction>,
    cli_uri: Option<String>,
    machine_settings: PathBuf,
    user_settings: PathBuf,
    password_attempts: u32,
}

impl ConfigurationResolutionOperation {
    /// Create the operation.
    pub fn new(
        repository: Arc<dyn SettingsRepository>,
        interaction: Arc<dyn UserInteraction>,
        cli_uri: Option<String>,
        machine_settings: PathBuf,
        user_settings: PathBuf,
        password_attempts: u32,
    ) -> Self {
        Self {
            repository,
            interaction,
            cli_uri,
            machine_settings,
            user_settings,
            password_attempts,
        }
    }

    /// Administrator password hash stored in the machine configuration.
    fn machine_admin_hash(&self) -> Option<String> {
        if !self.machine_settings.exists() {
            return None;
        }
        let uri = self.machine_settings.to_string_lossy();
        match self.repository.try_load_settings(&uri, None) {
            Ok(outcome) if outcome.status == LoadStatus::Success => outcome
                .settings
                .and_then(|s| s.security.admin_password_hash),
            _ => None,
        }
    }

    /// Pick the settings source: `(uri, prompt purpose, pre-auth candidate)`.
    ///
    /// `None` means no source was found and the built-in defaults apply.
    fn resolve_source(
        &self,
        context: &SessionContext,
    ) -> Option<(String, PasswordPurpose, Option<PasswordParameters>)> {
        let supplied_uri = context
            .reconfiguration_uri()
            .map(str::to_string)
            .or_else(|| self.cli_uri.clone());

        if let Some(uri) = supplied_uri {
            // Pre-authenticate with the locally stored administrator hash so
            // a previously configured machine does not re-prompt
            let preauth = self.machine_admin_hash().map(PasswordParameters::hashed);
            return Some((uri, PasswordPurpose::RemoteSettings, preauth));
        }

        if self.machine_settings.exists() {
            let uri = self.machine_settings.to_string_lossy().into_owned();
            return Some((uri, PasswordPurpose::LocalSettings, None));
        }

        if self.user_settings.exists() {
            let uri = self.user_settings.to_string_lossy().into_owned();
            return Some((uri, PasswordPurpose::LocalSettings, None));
        }

        None
    }

    /// Load `uri`, prompting for passwords up to the attempt limit.
    fn load_with_prompts(
        &self,
        uri: &str,
        purpose: PasswordPurpose,
        preauth: Option<PasswordParameters>,
    ) -> LoadResult {
        let mut password = preauth;
        let mut prompts = 0;

        loop {
            let outcome = match self.repository.try_load_settings(uri, password.as_ref()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Loading settings resource '{}' failed: {}", uri, e);
                    return LoadResult::Fail;
                }
            };

            match outcome.status {
                LoadStatus::Success => match outcome.settings {
                    Some(settings) => return LoadResult::Loaded(settings),
                    None => {
                        error!("Resource '{}' reported success without settings", uri);
                        return LoadResult::Fail;
                    }
                },
                LoadStatus::PasswordNeeded => {
                    if prompts >= self.password_attempts {
                        error!(
                            "Password attempts exhausted for '{}' (limit: {})",
                            uri, self.password_attempts
                        );
                        return LoadResult::Abort;
                    }
                    prompts += 1;
                    match self.interaction.request_password(purpose) {
                        Some(input) => password = Some(PasswordParameters::raw(input)),
                        None => {
                            info!("Operator cancelled the password prompt for '{}'", uri);
                            return LoadResult::Abort;
                        }
                    }
                }
                LoadStatus::LoadWithBrowser => return LoadResult::Browser,
                LoadStatus::InvalidData | LoadStatus::NotSupported => {
                    self.interaction.show_message(&format!(
                        "The settings resource '{uri}' cannot be used"
                    ));
                    return LoadResult::Fail;
                }
                LoadStatus::UnexpectedError => {
                    error!("Unexpected error loading '{}'", uri);
                    return LoadResult::Fail;
                }
            }
        }
    }

    /// Persist the loaded settings as the machine's client configuration.
    fn write_back(&self, context: &SessionContext, uri: &str) -> OperationResult {
        let Some(next) = context.next() else {
            return OperationResult::Failed;
        };

        let current_hash = self.machine_admin_hash();
        let new_hash = next.settings.security.admin_password_hash.clone();

        // Authenticate against the *current* machine configuration, skipped
        // when the incoming settings carry the same administrator password
        let mut candidate = match (&current_hash, &new_hash) {
            (None, _) => Some(PasswordParameters::hashed(String::new())),
            (Some(current), Some(new)) if current == new => {
                debug!("Incoming settings carry the current administrator password");
                Some(PasswordParameters::hashed(current.clone()))
            }
            (Some(_), _) => None,
        };

        let mut prompts = 0;
        loop {
            let password = match candidate.take() {
                Some(password) => password,
                None => {
                    if prompts >= self.password_attempts {
                        error!(
                            "Administrator password attempts exhausted (limit: {})",
                            self.password_attempts
                        );
                        return OperationResult::Aborted;
                    }
                    prompts += 1;
                    match self.interaction.request_password(PasswordPurpose::LocalAdmin) {
                        Some(input) => PasswordParameters::raw(input),
                        None => {
                            info!("Operator cancelled the administrator password prompt");
                            return OperationResult::Aborted;
                        }
                    }
                }
            };

            match self.repository.configure_client_with(uri, &password) {
                Ok(SaveStatus::Success) => {
                    info!("Client configuration written back from '{}'", uri);
                    break;
                }
                Ok(SaveStatus::InvalidPassword) => {
                    warn!("Administrator password rejected during write-back");
                }
                Ok(SaveStatus::UnexpectedError) => {
                    error!("Client configuration write-back failed for '{}'", uri);
                    return OperationResult::Failed;
                }
                Err(e) => {
                    error!("Client configuration write-back failed: {}", e);
                    return OperationResult::Failed;
                }
            }
        }

        // On a pure provisioning run the operator may abort startup here
        let first_session = context.current().is_none();
        if first_session && next.settings.security.ask_to_quit_after_configure {
            let quit = self
                .interaction
                .confirm("The client configuration was saved. Abort session startup?");
            if quit {
                info!("Operator chose to abort startup after provisioning");
                return OperationResult::Aborted;
            }
        }

        OperationResult::Success
    }

    fn resolve(&self, context: &mut SessionContext) -> OperationResult {
        if context.next().is_none() {
            error!("Configuration resolution ran without a pending session");
            return OperationResult::Failed;
        }

        let Some((uri, purpose, preauth)) = self.resolve_source(context) else {
            info!("No settings source found, using built-in defaults");
            let defaults = self.repository.load_default_settings();
            if let Some(next) = context.next_mut() {
                next.settings = defaults;
            }
            return OperationResult::Success;
        };

        info!("Resolved settings source: '{}'", uri);
        match self.load_with_prompts(&uri, purpose, preauth) {
            LoadResult::Loaded(settings) => {
                let configure_client = settings.security.configure_client;
                if let Some(next) = context.next_mut() {
                    next.settings = settings;
                }
                if configure_client {
                    return self.write_back(context, &uri);
                }
                OperationResult::Success
            }
            LoadResult::Browser => {
                info!(
                    "Resource '{}' is a login page; relaxing the pending configuration",
                    uri
                );
                let mut settings = self.repository.load_default_settings();
                settings.relax_for_browser_resource(&uri);
                if let Some(next) = context.next_mut() {
                    next.settings = settings;
                    next.is_browser_resource = true;
                }
                OperationResult::Success
            }
            LoadResult::Abort => OperationResult::Aborted,
            LoadResult::Fail => OperationResult::Failed,
        }
    }
}

impl Operation for ConfigurationResolutionOperation {
    fn name(&self) -> &'static str {
        "configuration resolution"
    }

    fn perform(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.resolve(context)
    }

    fn repeat(
        &mut self,
        context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        self.resolve(context)
    }

    fn revert(
        &mut self,
        _context: &mut SessionContext,
        _observer: &dyn ProgressObserver,
    ) -> OperationResult {
        OperationResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::NullObserver;
    use crate::testing::{ScriptedInteraction, ScriptedRepository};
    use lockdown_core::{SessionConfiguration, SessionMode};
    use std::path::Path;

    fn context_with_next() -> SessionContext {
        let mut context = SessionContext::new();
        context.set_next(SessionConfiguration::new(
            Settings::default(),
            Path::new("/tmp/lockdown-tests"),
        ));
        context
    }

    fn nonexistent(name: &str) -> PathBuf {
        PathBuf::from(format!("/nonexistent/lockdown/{name}.yaml"))
    }

    fn operation(
        repository: ScriptedRepository,
        interaction: ScriptedInteraction,
        cli_uri: Option<&str>,
    ) -> ConfigurationResolutionOperation {
        ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::new(interaction),
            cli_uri.map(str::to_string),
            nonexistent("machine"),
            nonexistent("user"),
            5,
        )
    }

    #[test]
    fn test_defaults_when_no_source_found() {
        let mut settings = Settings::default();
        settings.session_mode = SessionMode::Normal;
        let repository = ScriptedRepository::new().with_defaults(settings.clone());
        let load_calls = repository.load_calls();

        let mut op = operation(repository, ScriptedInteraction::new(), None);
        let mut context = context_with_next();

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        assert_eq!(context.next().unwrap().settings, settings);
        // No source: the repository is never asked to load anything
        assert!(load_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cli_uri_takes_precedence() {
        let repository = ScriptedRepository::new();
        let load_calls = repository.load_calls();

        let mut op = operation(
            repository,
            ScriptedInteraction::new(),
            Some("/tmp/cli-settings.yaml"),
        );
        let mut context = context_with_next();

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        let calls = load_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].uri, "/tmp/cli-settings.yaml");
    }

    #[test]
    fn test_machine_file_beats_user_file() {
        let dir = std::env::temp_dir().join(format!(
            "lockdown-config-op-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let machine = dir.join("machine.yaml");
        let user = dir.join("user.yaml");
        std::fs::write(&machine, "settings: {}\n").unwrap();
        std::fs::write(&user, "settings: {}\n").unwrap();

        let repository = ScriptedRepository::new();
        let load_calls = repository.load_calls();

        let mut op = ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::new(ScriptedInteraction::new()),
            None,
            machine.clone(),
            user,
            5,
        );
        let mut context = context_with_next();

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );
        let calls = load_calls.lock().unwrap();
        assert_eq!(calls[0].uri, machine.to_string_lossy());
    }

    #[test]
    fn test_reconfiguration_uri_beats_cli_uri() {
        let repository = ScriptedRepository::new();
        let load_calls = repository.load_calls();

        let mut op = operation(
            repository,
            ScriptedInteraction::new(),
            Some("/tmp/cli-settings.yaml"),
        );
        let mut context = context_with_next();
        context.set_reconfiguration_uri(Some("/tmp/reconfigure.yaml".to_string()));

        assert_eq!(
            op.repeat(&mut context, &NullObserver),
            OperationResult::Success
        );
        assert_eq!(
            load_calls.lock().unwrap()[0].uri,
            "/tmp/reconfigure.yaml"
        );
    }

    #[test]
    fn test_password_prompt_retries_until_success() {
        let repository = ScriptedRepository::new().with_load_responses(vec![
            (LoadStatus::PasswordNeeded, None),
            (LoadStatus::PasswordNeeded, None),
            (LoadStatus::Success, Some(Settings::default())),
        ]);
        let interaction = Arc::new(
            ScriptedInteraction::new().with_passwords(vec![Some("wrong"), Some("right")]),
        );

        let mut op = ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::clone(&interaction) as Arc<dyn UserInteraction>,
            Some("/tmp/protected.yaml".to_string()),
            nonexistent("machine"),
            nonexistent("user"),
            5,
        );
        let mut context = context_with_next();

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        assert_eq!(interaction.password_request_count(), 2);
    }

    #[test]
    fn test_password_attempts_exhaust_exactly() {
        let repository = ScriptedRepository::new().with_load_responses(vec![
            (LoadStatus::PasswordNeeded, None); 6
        ]);
        let interaction = ScriptedInteraction::new().with_passwords(vec![
            Some("a"),
            Some("b"),
            Some("c"),
            Some("d"),
            Some("e"),
        ]);
        let interaction = Arc::new(interaction);

        let mut op = ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::clone(&interaction) as Arc<dyn UserInteraction>,
            Some("/tmp/protected.yaml".to_string()),
            nonexistent("machine"),
            nonexistent("user"),
            5,
        );
        let mut context = context_with_next();

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Aborted);
        // Exactly five prompts: never fewer, never more
        assert_eq!(interaction.password_request_count(), 5);
    }

    #[test]
    fn test_cancelled_password_prompt_aborts() {
        let repository = ScriptedRepository::new()
            .with_load_responses(vec![(LoadStatus::PasswordNeeded, None)]);
        let interaction = Arc::new(ScriptedInteraction::new().with_passwords(vec![None]));

        let mut op = ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::clone(&interaction) as Arc<dyn UserInteraction>,
            Some("/tmp/protected.yaml".to_string()),
            nonexistent("machine"),
            nonexistent("user"),
            5,
        );
        let mut context = context_with_next();

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Aborted
        );
        assert_eq!(interaction.password_request_count(), 1);
    }

    #[test]
    fn test_browser_resource_relaxes_configuration() {
        let repository = ScriptedRepository::new()
            .with_load_responses(vec![(LoadStatus::LoadWithBrowser, None)]);

        let mut op = operation(
            repository,
            ScriptedInteraction::new(),
            Some("https://exam.example.org/login"),
        );
        let mut context = context_with_next();

        let result = op.perform(&mut context, &NullObserver);

        assert_eq!(result, OperationResult::Success);
        let next = context.next().unwrap();
        assert!(next.is_browser_resource);
        assert_eq!(
            next.settings.browser.start_url,
            "https://exam.example.org/login"
        );
        assert!(next.settings.security.allowed_processes.is_empty());
        assert_eq!(next.settings.display.allowed_display_count, None);
        assert_eq!(
            next.settings.service.policy,
            lockdown_core::ServicePolicy::Ignore
        );
    }

    #[test]
    fn test_invalid_data_fails() {
        let repository = ScriptedRepository::new()
            .with_load_responses(vec![(LoadStatus::InvalidData, None)]);

        let mut op = operation(repository, ScriptedInteraction::new(), Some("/tmp/bad.yaml"));
        let mut context = context_with_next();

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Failed
        );
    }

    #[test]
    fn test_write_back_without_admin_password() {
        let mut incoming = Settings::default();
        incoming.security.configure_client = true;

        let repository = ScriptedRepository::new()
            .with_load_responses(vec![(LoadStatus::Success, Some(incoming))]);
        let configure_calls = repository.configure_calls();
        let interaction = Arc::new(ScriptedInteraction::new());

        let mut op = ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::clone(&interaction) as Arc<dyn UserInteraction>,
            Some("/tmp/provision.yaml".to_string()),
            nonexistent("machine"),
            nonexistent("user"),
            5,
        );
        let mut context = context_with_next();

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );
        // No current admin password: write-back happens without a prompt
        assert_eq!(configure_calls.lock().unwrap().len(), 1);
        assert_eq!(interaction.password_request_count(), 0);
    }

    #[test]
    fn test_write_back_retries_on_invalid_password() {
        let mut incoming = Settings::default();
        incoming.security.configure_client = true;

        let repository = ScriptedRepository::new()
            .with_load_responses(vec![(LoadStatus::Success, Some(incoming))])
            .with_save_statuses(vec![SaveStatus::InvalidPassword, SaveStatus::Success]);
        let configure_calls = repository.configure_calls();
        let interaction =
            Arc::new(ScriptedInteraction::new().with_passwords(vec![Some("admin")]));

        let mut op = ConfigurationResolutionOperation::new(
            Arc::new(repository),
            Arc::clone(&interaction) as Arc<dyn UserInteraction>,
            Some("/tmp/provision.yaml".to_string()),
            nonexistent("machine"),
            nonexistent("user"),
            5,
        );
        let mut context = context_with_next();

        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Success
        );
        assert_eq!(configure_calls.lock().unwrap().len(), 2);
        assert_eq!(interaction.password_request_count(), 1);
    }

    #[test]
    fn test_provisioning_run_can_abort_after_write_back() {
        let mut incoming = Settings::default();
        incoming.security.configure_client = true;
        incoming.security.ask_to_quit_after_configure = true;

        let repository = ScriptedRepository::new()
            .with_load_responses(vec![(LoadStatus::Success, Some(incoming))]);
        let interaction =
            ScriptedInteraction::new().with_confirmations(vec![true]);

        let mut op = operation(repository, interaction, Some("/tmp/provision.yaml"));
        let mut context = context_with_next();

        // First-ever session (no current): the operator chose to abort
        assert_eq!(
            op.perform(&mut context, &NullObserver),
            OperationResult::Aborted
        );
    }

    #[test]
    fn test_revert_is_noop() {
        let mut op = operation(ScriptedRepository::new(), ScriptedInteraction::new(), None);
        let mut context = SessionContext::new();
        assert_eq!(
            op.revert(&mut context, &NullObserver),
            OperationResult::Success
        );
    }
}
