//! CLI command implementations.

pub mod cart;
pub mod checkout;
pub mod migrate;
pub mod orders;

use std::path::PathBuf;

use opticart_storefront::cart::{CartStore, FileStorage};
use opticart_storefront::checkout::SubmitError;
use opticart_storefront::config::{ConfigError, StorefrontConfig};
use opticart_storefront::db;
use opticart_storefront::orders::{OrderBackend, OrderRepository, PgOrderStore, RepositoryError};
use thiserror::Error;

/// User ID recorded for administrator actions taken from the CLI.
pub const CLI_ADMIN_ID: &str = "cli-admin";

/// Default directory for the terminal cart.
const DEFAULT_DATA_DIR: &str = ".opticart";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The order store rejected the operation.
    #[error("Order store error: {0}")]
    Store(#[from] RepositoryError),

    /// Checkout did not place an order.
    #[error("Checkout failed: {0}")]
    Checkout(#[from] SubmitError),

    /// A command-line value was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Load configuration and connect to the storefront database.
async fn connect() -> Result<sqlx::PgPool, CommandError> {
    let config = StorefrontConfig::from_env()?;
    let database_url = config.require_database_url()?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(database_url).await?)
}

/// The order repository over the configured database.
async fn order_repository() -> Result<OrderRepository, CommandError> {
    let pool = connect().await?;
    Ok(OrderRepository::new(OrderBackend::Postgres(
        PgOrderStore::new(pool),
    )))
}

/// Directory holding the terminal cart.
fn data_dir() -> PathBuf {
    dotenvy::dotenv().ok();
    std::env::var_os("OPTICART_DATA_DIR").map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from)
}

/// The terminal cart, rehydrated from disk.
fn load_cart() -> CartStore<FileStorage> {
    CartStore::load(FileStorage::new(data_dir()))
}
