//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! modesta migrate
//! ```
//!
//! Runs the migrations embedded from `crates/commerce/migrations/`, including
//! the `tower_sessions` table the storefront keeps carts in.
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use sqlx::PgPool;

use super::CliError;

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `CliError::Migrate` if a migration fails or the applied history
/// does not match the embedded files.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    tracing::info!("Running commerce migrations...");
    modesta_commerce::MIGRATOR.run(pool).await?;
    tracing::info!("Migrations complete!");
    Ok(())
}
