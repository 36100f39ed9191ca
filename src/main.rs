//! switchhook: SwitchBot webhook ingestion service.
//!
//! Loads configuration, connects to PostgreSQL, prepares the sample table
//! and serves the webhook API until shut down.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use switchhook_api::{
    auth::{AuthConfigSource, Authenticator, StaticAuthConfigSource},
    pipeline::WebhookProcessor,
    server::{start_server, AppState},
    Config,
};
use switchhook_core::{Clock, EnvironmentRepository, PgEnvironmentRepository, RealClock};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting switchhook webhook ingestion service");
    info!(
        database_url = %config.database_url_masked(),
        app_env = %config.app_env,
        environment_table = %config.environment_table,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let addr = config.parse_server_addr()?;

    let db_pool = Arc::new(create_database_pool(&config).await?);
    info!("Database connection pool established");

    let repository = PgEnvironmentRepository::new(db_pool.clone(), config.environment_table.clone())
        .context("Invalid environment table name")?;
    repository.ensure_schema().await.context("Failed to create environment table")?;
    info!(table = %repository.table(), "Database schema ready");

    let auth_config = config.auth_config();
    if auth_config.is_none() {
        warn!(
            app_env = %config.app_env,
            "SwitchBot credentials not configured; signed webhooks will be rejected"
        );
    }
    let auth_source: Arc<dyn AuthConfigSource> = Arc::new(StaticAuthConfigSource::new(auth_config));

    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());
    let repository: Arc<dyn EnvironmentRepository> = Arc::new(repository);
    let processor = WebhookProcessor::new(
        Authenticator::new(config.auth_policy(), clock.clone()),
        auth_source,
        repository,
    )
    .with_deadline(config.request_timeout());

    let mut state = AppState::new(processor, clock);
    state.max_payload_bytes = config.max_payload_bytes;
    state.trusted_proxies = config.forwarding_proxies().into();

    start_server(state, addr).await.context("HTTP server failed")?;

    db_pool.close().await;
    info!("Database connections closed");

    info!("switchhook shutdown complete");
    Ok(())
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);
    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(config.database_idle_timeout))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
