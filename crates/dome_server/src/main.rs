//! Service entry point: wires C1-C7 to an axum HTTP surface (§6), grounded
//! on `proerror77-ploy`'s `main.rs` CLI-parse → logging-init → run shape and
//! its `shutdown_signal` ctrl-c/SIGTERM select.

mod bootstrap;
mod error;
mod handlers;
mod routes;
mod settings;
mod state;

use clap::Parser;
use dome_core::{EventBus, InMemoryStore, SeasonCoordinator, SeasonId, Store, TournamentEngine};
use settings::ServerSettings;
use state::AppState;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dome_server", about = "Season timing, tournament and live-match simulation service")]
struct Cli {
    /// Path to a config file or directory of `default.toml` / `<DOME_ENV>.toml`.
    #[arg(long, env = "DOME_CONFIG", default_value = "config")]
    config: PathBuf,

    /// Overrides `bind_addr` from the loaded configuration.
    #[arg(long, env = "DOME_BIND_ADDR")]
    bind_addr: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dome_core=debug,dome_server=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let mut settings = match ServerSettings::load(&cli.config) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::from(1);
        }
    };
    if let Some(bind_addr) = cli.bind_addr {
        settings.bind_addr = bind_addr;
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        // §6: 2 is "persistence unreachable at startup" — with `InMemoryStore`
        // that can't happen, but a listener-bind failure lands in the same
        // early "couldn't come up" bucket and gets the same code.
        Err(RunError::Startup(err)) => {
            error!(error = %err, "server failed to start");
            ExitCode::from(2)
        }
        // §6: 3 is "panic during shutdown".
        Err(RunError::ShutdownPanic(err)) => {
            error!(error = %err, "a background task panicked while shutting down");
            ExitCode::from(3)
        }
    }
}

enum RunError {
    Startup(anyhow::Error),
    ShutdownPanic(tokio::task::JoinError),
}

impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        Self::Startup(err)
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        Self::Startup(err.into())
    }
}

async fn run(settings: ServerSettings) -> Result<(), RunError> {
    let season_id = SeasonId(1);
    let in_memory_store = InMemoryStore::new();
    bootstrap::ensure_season(&in_memory_store, season_id, settings.season_start);
    let store: Arc<dyn Store> = Arc::new(in_memory_store);

    let match_bus = Arc::new(EventBus::new());
    let tournament_bus = Arc::new(EventBus::new());
    let season_phase_bus = Arc::new(EventBus::new());
    let live_matches = Arc::new(dome_core::LiveMatchRegistry::new());

    let tournament_engine =
        Arc::new(TournamentEngine::new(store.clone(), tournament_bus.clone(), settings.core.clone()));
    let coordinator = Arc::new(SeasonCoordinator::new(
        store.clone(),
        match_bus.clone(),
        tournament_bus.clone(),
        season_phase_bus.clone(),
        tournament_engine.clone(),
        live_matches,
        settings.core.clone(),
        season_id,
    ));

    let advancer_cancel = CancellationToken::new();
    let advancer_handle = tokio::spawn(tournament_engine.clone().run_advancer(advancer_cancel.clone()));
    let coordinator_handle = tokio::spawn(coordinator.clone().watch());

    let state = AppState {
        store,
        match_bus,
        tournament_bus,
        season_phase_bus,
        tournament_engine,
        coordinator: coordinator.clone(),
        config: settings.core.clone(),
        season_id,
        started_at: chrono::Utc::now(),
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr.as_str()).await?;
    info!(bind_addr = %settings.bind_addr, "dome_server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("shutdown signal received, draining in-flight matches");
    coordinator.stop().await;
    advancer_cancel.cancel();

    if let Err(err) = coordinator_handle.await {
        if err.is_panic() {
            return Err(RunError::ShutdownPanic(err));
        }
        warn!(error = %err, "season coordinator task cancelled during shutdown");
    }
    if let Err(err) = advancer_handle.await {
        if err.is_panic() {
            return Err(RunError::ShutdownPanic(err));
        }
        warn!(error = %err, "tournament advancer task cancelled during shutdown");
    }

    Ok(())
}

/// Waits on ctrl-c or, on unix, SIGTERM (§6's "graceful" shutdown trigger).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
