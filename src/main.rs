//! Wallet Injection — Entry Point
//!
//! Loads configuration and logging, wires the wallet bridge, and runs
//! wallet sessions until SIGINT or stdin `quit`.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create the bridge client (if configured) and its host
//! 4. Spawn health/metrics server
//! 5. Spawn the bridge event poller
//! 6. Mount a session: detect → initialize → run
//! 7. On chain change, tear down and mount a fresh session
//! 8. On SIGINT / quit, tear down and exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use wallet_injection::adapters::bridge::{BridgeClient, BridgeClientConfig, BridgeHost, EventPoller};
use wallet_injection::adapters::console::{self, Command};
use wallet_injection::adapters::metrics::{HealthServer, MetricsRegistry};
use wallet_injection::config::{self, AppConfig};
use wallet_injection::ports::telemetry::SessionObserver;
use wallet_injection::usecases::connection::{ConnectionStateMachine, SessionExit};

/// Environment variable selecting the config file.
const CONFIG_PATH_ENV: &str = "WALLET_CONFIG";

/// How one mounted session ended, from the host's point of view.
enum HostAction {
    Remount,
    Exit,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        bridge = ?config.provider.bridge_url,
        "Starting wallet session host"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Bridge client (the injected provider) ────────────
    let client = match BridgeClientConfig::from_provider(&config.provider) {
        Some(bridge_config) => Some(Arc::new(
            BridgeClient::new(bridge_config).context("Failed to create bridge client")?,
        )),
        None => {
            warn!("No provider.bridge_url configured — no wallet provider will be detected");
            None
        }
    };
    let host = BridgeHost::new(client.clone());

    // ── 5. Metrics + health server ──────────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let health_handle = config.metrics.enabled.then(|| {
        let server = HealthServer::new(Arc::clone(&metrics), config.metrics.bind_address.clone());
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                error!(error = %e, "Health server failed");
            }
        })
    });

    // ── 6. Event poller for the bridge ──────────────────────
    let poller_handle = client.as_ref().map(|client| {
        let mut poller = EventPoller::new(Arc::clone(client), &config.provider);
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = poller.run(shutdown).await {
                error!(error = %e, "Event poller failed");
            }
        })
    });

    // ── 7. Console input + SIGINT ───────────────────────────
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);
    let _stdin_handle = console::spawn_stdin_reader(command_tx.clone());
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("SIGINT received, initiating graceful shutdown");
            let _ = command_tx.send(Command::Quit).await;
        }
    });

    // ── 8. Session mount / reload loop ──────────────────────
    let observer: Arc<dyn SessionObserver> = metrics;
    loop {
        match mount_session(&config, &host, Arc::clone(&observer), &mut command_rx).await {
            HostAction::Remount => info!("Reloading session"),
            HostAction::Exit => break,
        }
    }

    // ── Graceful shutdown ───────────────────────────────────
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    if let Some(handle) = poller_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Mount one session and drive it until it asks for a reload or the
/// user quits.
async fn mount_session(
    config: &AppConfig,
    host: &BridgeHost,
    observer: Arc<dyn SessionObserver>,
    commands: &mut mpsc::Receiver<Command>,
) -> HostAction {
    let machine = Arc::new(ConnectionStateMachine::with_observer(
        config.session.clone(),
        observer,
    ));
    let renderer = console::spawn_renderer(machine.subscribe_view());

    let (session_shutdown_tx, session_shutdown_rx) = broadcast::channel::<()>(1);
    let mut run_handle = match machine.initialize(host).await {
        Some(events) => {
            let machine = Arc::clone(&machine);
            tokio::spawn(async move { machine.run(events, session_shutdown_rx).await })
        }
        None => {
            // No provider: nothing to run, wait for the host to end the session.
            let mut shutdown_rx = session_shutdown_rx;
            tokio::spawn(async move {
                let _ = shutdown_rx.recv().await;
                SessionExit::Shutdown
            })
        }
    };
    println!("{}", console::render(&machine.view().await));

    let mut finished = false;
    let action = loop {
        tokio::select! {
            exit = &mut run_handle => {
                finished = true;
                match exit {
                    Ok(SessionExit::Reload) => break HostAction::Remount,
                    Ok(SessionExit::ProviderClosed) => {
                        warn!("Provider event stream closed, remounting");
                        break HostAction::Remount;
                    }
                    Ok(SessionExit::Shutdown) => break HostAction::Exit,
                    Err(e) => {
                        error!(error = %e, "Session task failed");
                        break HostAction::Exit;
                    }
                }
            }
            command = commands.recv() => match command {
                Some(Command::Quit) | None => break HostAction::Exit,
                Some(command) => {
                    console::spawn_execute(Arc::clone(&machine), command);
                }
            }
        }
    };

    if !finished {
        let _ = session_shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(1), run_handle).await;
    }
    machine.teardown().await;
    renderer.abort();
    action
}
