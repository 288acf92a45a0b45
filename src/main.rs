use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cosearch::{
    app::build_router, application::lifecycle::LifecycleManager, config::AppConfig,
    infrastructure::open_store, state::AppState,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cosearch")]
#[command(version, about = "CoSearch preferences backend")]
struct Cli {
    /// Overrides COSEARCH_BIND_ADDR.
    #[arg(long, global = true)]
    bind: Option<SocketAddr>,
    /// Overrides COSEARCH_DATA_FILE.
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Run one inactivity sweep against the data file and print the report.
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .context("failed to load configuration")?
        .with_overrides(cli.bind, cli.data_file);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sweep => sweep(config).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let (repository, store_kind) = open_store(config.data_file.as_deref())
        .await
        .context("failed to open preferences store")?;
    let lifecycle = Arc::new(LifecycleManager::new(repository.clone(), config.retention));
    let state = AppState::new(
        repository.clone(),
        lifecycle.clone(),
        config.admin_password.clone(),
        store_kind,
    );

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    lifecycle.start().await;
    info!(
        bind_addr = %config.bind_addr,
        store = store_kind,
        "cosearch API started"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    lifecycle.shutdown().await;
    if let Err(err) = repository.checkpoint().await {
        error!(error = %err, "final snapshot checkpoint failed");
    }
    served
}

async fn sweep(config: AppConfig) -> Result<()> {
    let Some(data_file) = config.data_file.as_deref() else {
        bail!("sweep needs a data file: set COSEARCH_DATA_FILE or pass --data-file");
    };

    let (repository, _) = open_store(Some(data_file))
        .await
        .context("failed to open preferences store")?;
    let lifecycle = LifecycleManager::new(repository.clone(), config.retention);
    let report = lifecycle.sweep_once().await.context("sweep failed")?;
    repository
        .checkpoint()
        .await
        .context("failed to write snapshot checkpoint")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode sweep report")?
    );
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cosearch=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
