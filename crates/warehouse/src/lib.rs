//! AssetWatch Warehouse Layer
//!
//! Per-request connections to the analytical warehouse (Snowflake, or a local
//! SQLite file) and the JSON-safety normalisation of their result sets.

mod config;
mod connection;
mod models;
mod normalize;
pub mod snowflake;
pub mod sqlite;

pub use config::{Credentials, SnowflakeSettings};
pub use connection::{Connection, Connector, Dialect};
pub use models::*;
pub use normalize::normalize;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Missing warehouse configuration: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Warehouse rejected request: {0}")]
    Api(String),

    #[error("Unexpected warehouse response: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, WarehouseError>;
