//! hostmend - host monitoring and auto-healing daemon
//!
//! # Usage
//!
//! ```bash
//! # Run the daemon (default subcommand)
//! hostmend run
//!
//! # Single cycle, then exit
//! hostmend run --once
//!
//! # Tail the event log
//! hostmend events --kind action --limit 20
//!
//! # Validate a config file
//! hostmend --config /etc/hostmend.toml check-config
//!
//! # Let a service whose restarts were exhausted be restarted again
//! curl -X POST http://127.0.0.1:8050/api/v1/services/nginx/reset
//! ```
//!
//! # Environment Variables
//!
//! - `HOSTMEND_CONFIG`: Path to the TOML config (default: `./hostmend.toml`)
//! - `HOSTMEND_CORS_ORIGINS`: Comma-separated origins allowed by the API
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hostmend::api::{create_app, DashboardState};
use hostmend::background::{ControlLoop, MonitorCycle};
use hostmend::config::HostmendConfig;
use hostmend::healing::{HealingEngine, HostRemediator, SysinfoProcessTable};
use hostmend::monitoring::{ServiceController, SysinfoMetrics, SystemctlController};
use hostmend::notify::Notifier;
use hostmend::storage::{default_sanitizer, EventCategory, EventStore, ProcessLock};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "hostmend")]
#[command(about = "Host health monitoring with bounded auto-healing")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides $HOSTMEND_CONFIG and ./hostmend.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the monitoring daemon
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Override the API listen address
        #[arg(short, long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },

    /// Print the most recent events as JSON lines
    Events {
        /// Only events of this kind (metric, alert, action, system)
        #[arg(long)]
        kind: Option<EventCategory>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete every event from the log (refused while the daemon runs)
    ClearLog {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ControlLoop,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ControlLoop => write!(f, "ControlLoop"),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<HostmendConfig> {
    let config = match path {
        Some(p) => HostmendConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display()))?,
        None => HostmendConfig::load().context("Failed to load config")?,
    };
    Ok(config)
}

fn open_store(config: &HostmendConfig) -> Result<Arc<EventStore>> {
    let path = config.event_log_path();
    let store = EventStore::open(&path)
        .with_context(|| format!("Failed to open event log {}", path.display()))?;
    let store = if config.storage.strip_decorations {
        store.with_sanitizer(default_sanitizer())
    } else {
        store
    };
    Ok(Arc::new(store))
}

// ============================================================================
// Supervisor
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Monitor tasks; cancel everything when one fails, then wait for the rest
/// so the control loop can write its shutdown event.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");
    let mut failure: Option<anyhow::Error> = None;

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => {
                info!("Supervisor: task {} completed", task_name);
                cancel_token.cancel();
            }
            Ok(Err(e)) => {
                error!("Supervisor: task failed: {:#}", e);
                cancel_token.cancel();
                failure.get_or_insert(e);
            }
            Err(e) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                failure.get_or_insert(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn spawn_signal_handler(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    warn!("SIGTERM handler unavailable: {}", e);
                    tokio::signal::ctrl_c().await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        tokio::signal::ctrl_c().await.ok();

        info!("Shutdown signal received");
        cancel_token.cancel();
    });
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run_daemon(config: HostmendConfig, once: bool, addr: Option<String>) -> Result<()> {
    let config = Arc::new(config);
    let _lock = ProcessLock::acquire(&config.storage.data_dir)?;
    let store = open_store(&config)?;

    info!(
        event_log = %store.path().display(),
        services = ?config.monitoring.services,
        healing = config.healing.enabled,
        "hostmend starting"
    );

    let controller: Arc<dyn ServiceController> =
        Arc::new(SystemctlController::new(config.healing.use_sudo));
    let remediator = HostRemediator::new(config.healing.clone(), Box::new(SysinfoProcessTable::new()));
    let engine = HealingEngine::new(
        config.healing.clone(),
        controller.clone(),
        Box::new(remediator),
        store.clone(),
    );
    let metrics = SysinfoMetrics::new(config.monitoring.disk_path.clone());
    let cycle = MonitorCycle::new(config.clone(), Box::new(metrics), controller, engine, store.clone());

    let state = DashboardState {
        store,
        status: cycle.status_handle(),
        stats: cycle.stats_handle(),
        resets: cycle.reset_handle(),
    };
    let notifier = Arc::new(
        Notifier::from_config(&config.notifications).context("Failed to set up notifications")?,
    );
    let control = ControlLoop::new(cycle, notifier, config.monitoring.interval());

    if once {
        control.run_single().await;
        let status = state.status.read().map(|s| s.clone());
        if let Ok(status) = status {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    spawn_signal_handler(cancel_token.clone());

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    if config.server.enabled {
        let addr = addr.unwrap_or_else(|| config.server.addr.clone());
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API listener on {}", addr))?;
        info!("Dashboard API listening on http://{}", addr);
        spawn_http_server(&mut task_set, listener, create_app(state), cancel_token.clone());
    }

    let loop_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[ControlLoop] Task starting");
        control.run(loop_cancel).await;
        Ok(TaskName::ControlLoop)
    });

    run_supervisor(&mut task_set, cancel_token).await
}

fn show_events(config: &HostmendConfig, kind: Option<EventCategory>, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    for event in store.read_kind(kind, limit)? {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn clear_log(config: &HostmendConfig, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to clear the event log without --yes");
    }
    // A running daemon would keep appending to the log it has open
    let _lock = ProcessLock::acquire(&config.storage.data_dir)
        .context("Cannot clear the event log while the daemon is running")?;
    let store = open_store(config)?;
    store.clear()?;
    println!("Cleared {}", store.path().display());
    Ok(())
}

fn check_config(config: &HostmendConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    println!("# Configuration OK");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = load_config(args.config.as_ref())?;

    match args.command.unwrap_or(SubCommand::Run {
        once: false,
        addr: None,
    }) {
        SubCommand::Run { once, addr } => run_daemon(config, once, addr).await?,
        SubCommand::Events { kind, limit } => show_events(&config, kind, limit)?,
        SubCommand::ClearLog { yes } => clear_log(&config, yes)?,
        SubCommand::CheckConfig => check_config(&config)?,
    }

    Ok(())
}
