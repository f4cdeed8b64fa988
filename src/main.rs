use clap::Parser;
use plot_relay::config::source::CONFIG_POLL_INTERVAL;
use plot_relay::config::{ConfigSource, FileConfigSource};
use plot_relay::engine::RelayEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Hands finished plot files to remote storage hosts")]
struct Args {
    /// Path of the JSON config file.
    #[arg(short, long, default_value = "/etc/plot-relay.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // 1. Config:
    let source = FileConfigSource::load(&args.config)?;
    let config = source.current();
    tracing::info!("Storage hosts: {:?}", config.hosts);
    if config.local_mode {
        tracing::info!("Local mode, every plot goes to {}", config.advertised_host());
    }

    // 2. Engine:
    let engine = RelayEngine::open(source.clone())?;
    engine.start()?;
    tokio::spawn(source.clone().watch(CONFIG_POLL_INTERVAL));

    // 3. File server:
    let file_addr = SocketAddr::from(([0, 0, 0, 0], config.ports.file_server));
    let file_listener = tokio::net::TcpListener::bind(file_addr).await?;
    let file_app = engine.file_router();
    tracing::info!("File server listening on {}", file_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(file_listener, file_app).await {
            tracing::error!("File server stopped: {}", e);
        }
    });

    // 4. Control API:
    let control_addr = SocketAddr::from(([0, 0, 0, 0], config.ports.control));
    let listener = tokio::net::TcpListener::bind(control_addr).await?;
    tracing::info!("Control API listening on {}", control_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, engine.control_router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
