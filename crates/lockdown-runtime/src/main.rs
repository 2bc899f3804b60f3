//! # Lockdown Runtime
//!
//! Supervising runtime process for locked-down exam sessions.
//!
//! ## Overview
//!
//! The runtime drives a reversible pipeline of operations that:
//! - resolves and decrypts the session settings
//! - validates machine policies (version, VM, remote session, displays)
//! - negotiates an exam with a remote server when configured
//! - brackets the session with the privileged service
//! - isolates the interactive desktop (kiosk mode)
//! - spawns and authenticates the client process
//!
//! ## Architecture
//!
//! This is the top layer - the runtime binary that ties together:
//! - lockdown-core: core types
//! - lockdown-proxy: collaborator contracts
//! - lockdown-detector: environment detectors
//! - lockdown-session: session orchestration

use std::sync::Arc;
use std::time::Duration;

use lockdown_core::{OperationResult, RuntimeConfig};
use lockdown_detector::{EnvRemoteSessionDetector, HeuristicVmDetector, StaticDisplayMonitor};
use lockdown_proxy::{
    FileSettingsRepository, LoggingDesktopFactory, LoggingShell, NativeProcessFactory,
    NullInteraction, SignalHub, UnavailableClientProxy, UnavailableExamServerProxy,
    UnavailableServiceProxy,
};
use lockdown_runtime::{spawn_probe, HostDependencies, RuntimeOptions, SessionHost};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|arg| arg == "--headless");
    let config_path = value_of(&args, "--config");
    let settings_uri = value_of(&args, "--uri");

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        "Lockdown Runtime v{} starting ({} mode)...",
        env!("CARGO_PKG_VERSION"),
        if headless { "headless" } else { "kiosk" }
    );

    let config = match &config_path {
        Some(path) => RuntimeConfig::from_file(path).map_err(|e| {
            tracing::error!("Cannot load runtime configuration '{}': {}", path, e);
            e
        })?,
        None => RuntimeConfig::default(),
    };

    let hub = Arc::new(SignalHub::new());
    let dependencies = HostDependencies {
        repository: Arc::new(FileSettingsRepository::new(
            config.paths.machine_settings.clone(),
            config.paths.log_dir.clone(),
        )),
        interaction: Arc::new(NullInteraction),
        service_proxy: Box::new(UnavailableServiceProxy),
        exam_proxy: Box::new(UnavailableExamServerProxy),
        client_proxy: Box::new(UnavailableClientProxy),
        process_factory: Arc::new(NativeProcessFactory::new()),
        desktop_factory: Box::new(LoggingDesktopFactory::new()),
        shell: Box::new(LoggingShell::new()),
        vm_detector: Arc::new(HeuristicVmDetector::new()),
        remote_detector: Arc::new(EnvRemoteSessionDetector::new()),
        display_monitor: Arc::new(StaticDisplayMonitor::default()),
        hub,
    };

    let options = RuntimeOptions {
        settings_uri,
        headless,
    };
    let mut host = SessionHost::new(&config, options, dependencies);

    let result = host.start_session()?;
    match result {
        OperationResult::Success => {
            tracing::info!("Session established");
        }
        OperationResult::Aborted => {
            tracing::info!("Session establishment aborted, shutting down");
            return Ok(());
        }
        OperationResult::Failed => {
            anyhow::bail!("session establishment failed");
        }
    }

    // Probe server reachability in the background; never awaited by the
    // pipeline itself
    if let Some(url) = host.active_server_url() {
        spawn_probe(url);
    }

    // Run until the client exits or the operator interrupts
    wait_for_shutdown(&host).await;

    tracing::info!("Tearing the session down");
    host.stop_session(true)?;

    tracing::info!("Lockdown Runtime shutting down");
    Ok(())
}

/// Block until Ctrl-C or, when a client is running, until it terminates.
async fn wait_for_shutdown(host: &SessionHost) {
    match host.client_terminated_signal() {
        Some(terminated) => {
            let mut watcher = tokio::task::spawn_blocking(move || {
                while !terminated.wait(Duration::from_secs(1)) {}
            });
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received");
                    watcher.abort();
                }
                _ = &mut watcher => {
                    tracing::info!("Client process exited");
                }
            }
        }
        None => {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Cannot listen for interrupts, shutting down");
            }
        }
    }
}

/// Value of `--flag value` style arguments.
fn value_of(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|pair| pair[0] == flag)
        .map(|pair| pair[1].clone())
}
