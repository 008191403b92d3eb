// PostgreSQL bootstrap: external DATABASE_URL or an embedded instance
// living under the application data directory.

pub mod models;
pub mod queries;

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use postgresql_embedded::{PostgreSQL, Settings, VersionReq};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::error::{CoreError, CoreResult};

const POSTGRES_VERSION: &str = "17.5.0";

static POSTGRESQL_INSTANCE: OnceCell<Arc<Mutex<PostgreSQL>>> = OnceCell::const_new();

/// Connect to the configured database, or boot an embedded instance when no
/// DATABASE_URL is set, then run schema migrations. The returned pool is the
/// only database handle in the process; repositories receive clones of it.
pub async fn initialize_database() -> CoreResult<PgPool> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => start_embedded_postgres().await?,
    };

    let pool = connect_with_retry(&database_url).await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| CoreError::Config(format!("database migration failed: {}", e)))?;

    tracing::info!("Database initialized");
    Ok(pool)
}

/// Stop the embedded PostgreSQL instance, if one was started.
pub async fn shutdown_database() {
    if let Some(instance) = POSTGRESQL_INSTANCE.get() {
        let instance = instance.clone();
        let result = tokio::task::spawn_blocking(move || {
            if let Ok(postgresql) = instance.lock() {
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(postgresql.stop())
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
            }
            Ok::<_, std::io::Error>(())
        })
        .await;

        match result {
            Ok(Ok(())) => tracing::info!("Embedded PostgreSQL stopped"),
            Ok(Err(e)) => tracing::error!("Failed to stop embedded PostgreSQL: {}", e),
            Err(e) => tracing::error!("PostgreSQL shutdown task failed: {}", e),
        }
    }
}

async fn start_embedded_postgres() -> CoreResult<String> {
    let mut settings = Settings::default();
    settings.version = VersionReq::parse(&format!("={}", POSTGRES_VERSION))
        .map_err(|e| CoreError::Config(format!("invalid postgres version: {}", e)))?;
    settings.temporary = false;
    settings.installation_dir = crate::global::get_app_data_dir().join("postgres");
    settings.data_dir = settings.installation_dir.join("data");
    settings.username = "postgres".to_string();
    settings.password =
        std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
    settings.host =
        std::env::var("POSTGRES_BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());
    settings.port = std::env::var("POSTGRES_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .or_else(|| find_available_port(54300, 54399))
        .ok_or_else(|| CoreError::Config("no available port for embedded postgres".into()))?;

    settings
        .configuration
        .insert("timezone".to_string(), "UTC".to_string());
    settings
        .configuration
        .insert("log_timezone".to_string(), "UTC".to_string());

    let mut postgresql = PostgreSQL::new(settings);
    tracing::info!(
        "Setting up embedded PostgreSQL on port {}",
        postgresql.settings().port
    );

    postgresql
        .setup()
        .await
        .map_err(|e| CoreError::Config(format!("embedded postgres setup failed: {}", e)))?;
    postgresql
        .start()
        .await
        .map_err(|e| CoreError::Config(format!("embedded postgres start failed: {}", e)))?;

    let database_url = postgresql.settings().url("postgres");

    POSTGRESQL_INSTANCE
        .set(Arc::new(Mutex::new(postgresql)))
        .map_err(|_| CoreError::Invariant("embedded postgres started twice".into()))?;

    Ok(database_url)
}

async fn connect_with_retry(database_url: &str) -> CoreResult<PgPool> {
    let max_attempts = 10;
    for attempt in 1..=max_attempts {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    "Database connection attempt {}/{} failed: {}",
                    attempt,
                    max_attempts,
                    e
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!()
}

fn find_available_port(start_port: u16, end_port: u16) -> Option<u16> {
    (start_port..=end_port)
        .find(|port| TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], *port))).is_ok())
}
