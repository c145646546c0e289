//! Connector abstraction shared by the warehouse backends

use crate::models::ResultSet;
use crate::Result;
use async_trait::async_trait;

/// SQL dialect spoken by a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Snowflake,
    Sqlite,
}

/// Hands out a fresh connection per call. Connections are never pooled.
#[async_trait]
pub trait Connector: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// A live, exclusively owned warehouse connection
#[async_trait]
pub trait Connection: Send {
    /// Run one statement and read its full result
    async fn query(&mut self, sql: &str) -> Result<ResultSet>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<()>;
}
