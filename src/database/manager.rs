use std::time::Duration;

use mongodb::{options::ClientOptions, Client, Database};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors raised by the store adapters
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Corrupt record: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    #[error(transparent)]
    BsonEncode(#[from] bson::ser::Error),

    #[error(transparent)]
    BsonDecode(#[from] bson::de::Error),
}

/// Owns the relational pool and the document database handle
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
    mongo: Database,
}

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.postgres_url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        if config.mongo_url.is_empty() {
            return Err(DatabaseError::ConfigMissing("MONGO_URL"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.postgres_url)
            .await?;
        info!("Connected to postgres at {}", redact(&config.postgres_url)?);

        let mut options = ClientOptions::parse(&config.mongo_url).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.connect_timeout = Some(Duration::from_secs(config.connection_timeout));
        let client = Client::with_options(options)?;
        let mongo = client.database(&config.mongo_database);
        info!(
            "Connected to mongo at {} (database {})",
            redact(&config.mongo_url)?,
            config.mongo_database
        );

        Ok(Self { pool, mongo })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn mongo(&self) -> &Database {
        &self.mongo
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed postgres pool");
    }
}

/// Connection string with the password masked, for logs
fn redact(connection_string: &str) -> Result<String, DatabaseError> {
    let mut url = url::Url::parse(connection_string).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    if url.password().is_some() {
        url.set_password(Some("***"))
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    }
    Ok(url.into())
}
