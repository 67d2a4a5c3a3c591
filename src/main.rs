use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leaddesk::{AppState, DocumentStore, build_router, config::AppConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "leaddesk", version, about = "Lead desk CRM backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Replay the journal under the data directory and write a fresh snapshot.
    Checkpoint {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
        data_dir: None,
    }) {
        Command::Serve {
            host,
            port,
            data_dir,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            serve(config).await
        }
        Command::Checkpoint { data_dir } => {
            let data_dir = data_dir
                .or(config.data_dir.clone())
                .context("checkpoint needs DATA_DIR or --data-dir")?;
            config.data_dir = Some(data_dir);
            let store = open_store(&config)?;
            store.checkpoint().await.context("checkpoint failed")?;
            info!("checkpoint written");
            Ok(())
        }
    }
}

fn open_store(config: &AppConfig) -> Result<DocumentStore> {
    match &config.data_dir {
        Some(dir) => DocumentStore::open(dir, config.durability, config.checkpoint_every)
            .with_context(|| format!("failed to open document store in {}", dir.display())),
        None => {
            warn!("DATA_DIR is not set; data lives in memory only");
            Ok(DocumentStore::in_memory())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = Arc::new(open_store(&config)?);
    let state = AppState::new(store.clone(), config.state_options()?);

    if state
        .sessions
        .ensure_admin(&config.admin_username, &config.admin_password)
        .await
        .context("failed to create the bootstrap admin")?
    {
        info!(username = %config.admin_username, "bootstrap admin created");
    }

    let app = build_router(state);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, persistent = store.is_persistent(), "leaddesk started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    if store.is_persistent() {
        store
            .checkpoint()
            .await
            .context("final checkpoint failed")?;
        info!("final checkpoint written");
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("leaddesk=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
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
                error!(error = %err, "unable to install SIGTERM handler");
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
