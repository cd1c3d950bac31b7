//! Database migration command.
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded into
//! the binary at compile time. The server never applies them itself.

use super::{CliError, connect};

/// Apply all pending storefront migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// a migration fails to apply.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
