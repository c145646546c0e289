//! Local SQLite warehouse for development and tests

use crate::connection::{Connection, Connector, Dialect};
use crate::models::{Cell, Column, ColumnKind, ResultSet};
use crate::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column as _, ConnectOptions, Connection as _, Row, TypeInfo, ValueRef};
use std::path::Path;
use tracing::debug;

/// Opens a read-only connection to a SQLite file per request
#[derive(Clone)]
pub struct SqliteConnector {
    options: SqliteConnectOptions,
}

impl SqliteConnector {
    /// Use an existing database file. The file is never created or written.
    pub fn open(path: &Path) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        Self { options }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = self.options.connect().await?;
        debug!(path = %self.options.get_filename().display(), "Opened SQLite connection");
        Ok(Box::new(SqliteSession { conn }))
    }
}

struct SqliteSession {
    conn: SqliteConnection,
}

#[async_trait]
impl Connection for SqliteSession {
    async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        let rows = sqlx::query(sql).fetch_all(&mut self.conn).await?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| Column::new(c.name(), column_kind(c.type_info().name())))
                    .collect()
            })
            .unwrap_or_default();

        let mut result = ResultSet::new(columns);
        for row in &rows {
            result.push_row(decode_row(row)?);
        }

        Ok(result)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Declared column type, falling back to the storage class of the first value
fn column_kind(declared: &str) -> ColumnKind {
    match declared.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" | "BIGINT" | "INT8" => ColumnKind::Integer,
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => ColumnKind::Float,
        "BOOLEAN" => ColumnKind::Boolean,
        "TEXT" | "VARCHAR" => ColumnKind::Text,
        "DATE" => ColumnKind::Date,
        "DATETIME" | "TIMESTAMP" => ColumnKind::Timestamp,
        "TIME" => ColumnKind::Time,
        _ => ColumnKind::Unknown,
    }
}

fn decode_row(row: &SqliteRow) -> Result<Vec<Cell>> {
    (0..row.len()).map(|index| decode_cell(row, index)).collect()
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<Cell> {
    let storage = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Cell::Null);
        }
        raw.type_info().name().to_owned()
    };

    // Dates are stored as TEXT in SQLite and stay text here
    let cell = match storage.as_str() {
        "INTEGER" => Cell::Int(row.try_get(index)?),
        "REAL" => Cell::Float(row.try_get(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            Cell::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Cell::Text(row.try_get(index)?),
    };

    Ok(cell)
}
