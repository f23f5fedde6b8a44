use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use achievement_api::config::{self, AppConfig};
use achievement_api::database::{
    DatabaseManager, MongoDocumentStore, PgIdentityStore, PgNotificationStore, PgReferenceStore,
};
use achievement_api::{app, AppState};

#[derive(Parser, Debug)]
#[command(name = "achievement-api")]
#[command(about = "Student achievement reporting and verification API")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Overrides APP_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, MONGO_URL, JWT_SECRET etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config: AppConfig = config::config().clone();
    tracing::info!("Starting achievement API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }

    let manager = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the stores")?;

    let documents = Arc::new(MongoDocumentStore::new(manager.mongo()));
    let references = Arc::new(PgReferenceStore::new(manager.pool().clone()));
    let notifications = Arc::new(PgNotificationStore::new(manager.pool().clone()));
    let identity = Arc::new(PgIdentityStore::new(manager.pool().clone()));

    let port = args.port.unwrap_or(config.api.port);
    let state = AppState::new(config, documents, references, notifications, identity);

    let bind_addr = format!("{}:{}", args.host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    manager.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
