use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lumen::{database, global, route, state};

#[derive(Debug, Parser)]
#[command(name = "lumen", about = "Self-hosted image management server")]
struct Args {
    /// HTTP port for the API server
    #[arg(long)]
    port: Option<u16>,

    /// Application data directory (defaults to ~/.lumen)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// PostgreSQL connection string; an embedded instance is started when
    /// this is absent
    #[arg(long)]
    database_url: Option<String>,
}

fn main() {
    let args = Args::parse();
    // Flags become env overrides before any global is touched.
    if let Some(dir) = &args.data_dir {
        std::env::set_var("APP_DATA_DIR", dir);
    }
    if let Some(url) = &args.database_url {
        std::env::set_var("DATABASE_URL", url);
    }
    if let Some(port) = args.port {
        std::env::set_var("PORT", port.to_string());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    if let Err(e) = runtime.block_on(run()) {
        tracing::error!("Server exited with error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("Starting {} (data dir: {:?})", global::APP_NAME.as_str(), global::get_app_data_dir());
    tokio::fs::create_dir_all(global::get_app_data_dir()).await?;

    let pool = database::initialize_database().await?;
    let state = state::build_state(pool).await?;
    state.scheduler.start().await?;

    let router = route::create_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], global::get_http_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    state.scheduler.stop().await;
    database::shutdown_database().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
