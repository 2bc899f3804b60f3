//! The user-facing settings tree applied to a session.
//!
//! A [`Settings`] value describes everything a session enforces: the kiosk
//! isolation mode, the service policy, security gates, display policy, the
//! browser start page and, for server-driven sessions, the exam server
//! connection. The on-disk representation is owned by the settings
//! repository; this module only defines the tree itself.

use serde::{Deserialize, Serialize};

use crate::version::VersionRestriction;

/// How the next session is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Settings come from a local or remote settings resource
    Normal,
    /// Settings are negotiated with an exam server
    Server,
}

/// Kiosk isolation mode for the interactive desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskMode {
    /// No isolation; the session runs on the normal desktop
    None,
    /// Create and activate a dedicated desktop for the session
    CreateNewDesktop,
    /// Keep the current desktop but suspend the interactive shell
    DisableExplorerShell,
}

/// Policy towards the privileged background service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServicePolicy {
    /// Service absence aborts the session with an error
    Mandatory,
    /// Service absence is surfaced to the user but the session proceeds
    Warn,
    /// The service is skipped entirely
    Ignore,
}

/// Policy towards running inside a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmPolicy {
    /// Virtual machines are permitted
    Allow,
    /// Detection of a virtual machine aborts the session
    Deny,
}

/// The full settings tree for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// How the session is driven
    pub session_mode: SessionMode,
    /// Kiosk isolation mode
    pub kiosk_mode: KioskMode,
    /// Service coordination settings
    pub service: ServiceSettings,
    /// Security settings
    pub security: SecuritySettings,
    /// Display policy settings
    pub display: DisplaySettings,
    /// Browser settings
    pub browser: BrowserSettings,
    /// Exam server settings (server mode only)
    pub server: ServerSettings,
}

impl Settings {
    /// Relax this settings tree for a browser resource.
    ///
    /// Applied when the configuration source turned out to be an interactive
    /// login page rather than a settings document: process allow/deny lists
    /// are cleared, the display allowance is widened, cache/cookie wiping is
    /// disabled, the service is ignored and the resource URI becomes the
    /// start page.
    pub fn relax_for_browser_resource(&mut self, uri: &str) {
        self.security.allowed_processes.clear();
        self.security.blocked_processes.clear();
        self.display.allowed_display_count = None;
        self.browser.clear_cache_on_exit = false;
        self.browser.clear_cookies_on_exit = false;
        self.service.policy = ServicePolicy::Ignore;
        self.browser.start_url = uri.to_string();
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Normal
    }
}

impl Default for KioskMode {
    fn default() -> Self {
        KioskMode::CreateNewDesktop
    }
}

/// Service coordination settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Policy towards the privileged service
    pub policy: ServicePolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            policy: ServicePolicy::Ignore,
        }
    }
}

/// Security settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// SHA-256 hash of the administrator password (None = not set)
    pub admin_password_hash: Option<String>,
    /// SHA-256 hash of the quit password (None = not set)
    pub quit_password_hash: Option<String>,
    /// Executables the session permits alongside the client (empty = none)
    pub allowed_processes: Vec<String>,
    /// Executables the session terminates on sight
    pub blocked_processes: Vec<String>,
    /// Persist these settings as the machine's client configuration
    pub configure_client: bool,
    /// After a successful first-session write-back, ask whether to abort startup
    pub ask_to_quit_after_configure: bool,
    /// Version restrictions the installed build must satisfy (empty = any)
    pub version_restrictions: Vec<VersionRestriction>,
    /// Policy towards virtual machines
    pub vm_policy: VmPolicy,
    /// Whether the session may run while a remote session is attached
    pub remote_sessions_allowed: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            admin_password_hash: None,
            quit_password_hash: None,
            allowed_processes: Vec::new(),
            blocked_processes: Vec::new(),
            configure_client: false,
            ask_to_quit_after_configure: false,
            version_restrictions: Vec::new(),
            vm_policy: VmPolicy::Allow,
            remote_sessions_allowed: false,
        }
    }
}

/// Display policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Maximum number of active displays (None = unrestricted)
    pub allowed_display_count: Option<u32>,
    /// Log a violation instead of aborting the session
    pub ignore_error: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            allowed_display_count: Some(1),
            ignore_error: false,
        }
    }
}

/// Browser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Start page the client navigates to
    pub start_url: String,
    /// Wipe the browser cache when the session ends
    pub clear_cache_on_exit: bool,
    /// Wipe cookies when the session ends
    pub clear_cookies_on_exit: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            start_url: "about:blank".to_string(),
            clear_cache_on_exit: true,
            clear_cookies_on_exit: true,
        }
    }
}

/// Exam server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL of the exam server
    pub url: String,
    /// Institution identifier sent on connect
    pub institution: String,
    /// Pre-pinned exam identifier (None = operator selects)
    pub exam_id: Option<String>,
    /// Whether falling back to an unrestricted session is permitted
    pub fallback_enabled: bool,
    /// Interval between keep-alive pings in milliseconds
    pub ping_interval_ms: u64,
}
