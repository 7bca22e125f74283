//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod orders;
pub mod products;

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use modesta_commerce::config::{get_database_url, get_env_or_default};
use modesta_commerce::gateway::DisabledGateway;
use modesta_commerce::notify::LogNotifier;
use modesta_commerce::{BackOfficeError, Commerce, CommerceConfig, ConfigError, Stores, db};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    BackOffice(#[from] BackOfficeError),

    /// A command-line value that clap accepted but the domain rejects.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Could not write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect to the commerce database named by `ADMIN_DATABASE_URL`
/// (or `DATABASE_URL`).
///
/// # Errors
///
/// Returns `CliError::Config` if no URL is set and `CliError::Database` if
/// the connection fails.
pub async fn connect() -> Result<PgPool, CliError> {
    let database_url = get_database_url("ADMIN_DATABASE_URL")?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Commerce services for maintenance work: no payment gateway and mail
/// only logged.
///
/// # Errors
///
/// Returns `CliError::Config` if the commerce settings are invalid.
pub fn commerce(pool: PgPool) -> Result<Commerce, CliError> {
    let config = CommerceConfig::from_env(get_env_or_default(
        "STOREFRONT_BASE_URL",
        "http://localhost:3000",
    ))?;
    Ok(Commerce::new(
        Stores::postgres(pool),
        Arc::new(DisabledGateway),
        Arc::new(LogNotifier),
        config,
    ))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use modesta_commerce::gateway::DisabledGateway;
    use modesta_commerce::memory::MemoryStore;
    use modesta_commerce::notify::LogNotifier;
    use modesta_commerce::{Commerce, CommerceConfig, Stores};

    pub fn commerce() -> (Arc<MemoryStore>, Commerce) {
        let store = Arc::new(MemoryStore::new());
        let commerce = Commerce::new(
            Stores::from_shared(Arc::clone(&store)),
            Arc::new(DisabledGateway),
            Arc::new(LogNotifier),
            CommerceConfig::new("https://shop.test"),
        );
        (store, commerce)
    }
}
