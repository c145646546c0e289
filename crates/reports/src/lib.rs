//! AssetWatch Reports
//!
//! Runs the fixed report catalogue against a warehouse connector. Every
//! report either yields JSON-safe rows or its hardcoded default.

mod catalogue;

pub use catalogue::*;

use assetwatch_warehouse::{normalize, Connector, Record, WarehouseError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Unknown report: {0}")]
    UnknownReport(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;

fn lookup(name: &str) -> Result<&'static ReportDefinition> {
    find(name).ok_or_else(|| ReportError::UnknownReport(name.to_string()))
}

/// Runs reports, opening one warehouse connection per invocation
#[derive(Clone)]
pub struct Reporter {
    connector: Arc<dyn Connector>,
}

impl Reporter {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Run a report, serving its default on any failure.
    ///
    /// Failures are logged and never reach the caller; an empty answer and a
    /// failed query look the same from outside.
    pub async fn run(&self, report: &ReportDefinition, limit: Option<u32>) -> Vec<Record> {
        match self.try_run(report, limit).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(report = report.name, error = %e, "Report failed, serving default");
                report.fallback_rows()
            }
        }
    }

    /// Run a report and surface any failure
    pub async fn try_run(&self, report: &ReportDefinition, limit: Option<u32>) -> Result<Vec<Record>> {
        let sql = report.sql(self.connector.dialect(), limit);

        let mut conn = self.connector.connect().await?;
        let outcome = conn.query(&sql).await;
        let released = conn.close().await;

        let result = match (outcome, released) {
            (Ok(result), Ok(())) => result,
            (Ok(_), Err(e)) => return Err(e.into()),
            (Err(e), released) => {
                if let Err(close_err) = released {
                    warn!(report = report.name, error = %close_err, "Failed to release connection");
                }
                return Err(e.into());
            }
        };

        debug!(report = report.name, rows = result.rows.len(), "Report query finished");
        Ok(normalize(result))
    }

    /// Run a report by catalogue name, serving its default on failure
    pub async fn run_named(&self, name: &str, limit: Option<u32>) -> Result<Vec<Record>> {
        Ok(self.run(lookup(name)?, limit).await)
    }

    /// Run a report by catalogue name and surface any failure
    pub async fn try_run_named(&self, name: &str, limit: Option<u32>) -> Result<Vec<Record>> {
        self.try_run(lookup(name)?, limit).await
    }

    pub async fn total_assets(&self) -> Vec<Record> {
        self.run(&TOTAL_ASSETS, None).await
    }

    pub async fn active_assets(&self) -> Vec<Record> {
        self.run(&ACTIVE_ASSETS, None).await
    }

    pub async fn assets_by_department(&self) -> Vec<Record> {
        self.run(&ASSETS_BY_DEPARTMENT, None).await
    }

    pub async fn total_vulnerabilities(&self) -> Vec<Record> {
        self.run(&TOTAL_VULNERABILITIES, None).await
    }

    pub async fn vulnerabilities_by_severity(&self) -> Vec<Record> {
        self.run(&VULNERABILITIES_BY_SEVERITY, None).await
    }

    pub async fn average_risk_score(&self) -> Vec<Record> {
        self.run(&AVERAGE_RISK_SCORE, None).await
    }

    pub async fn assets_by_month(&self) -> Vec<Record> {
        self.run(&ASSETS_BY_MONTH, None).await
    }

    pub async fn assets_by_type_donut(&self) -> Vec<Record> {
        self.run(&ASSETS_BY_TYPE_DONUT, None).await
    }

    /// Newest vulnerabilities; `limit` defaults to 10 and is capped at 100
    pub async fn latest_vulnerabilities(&self, limit: Option<u32>) -> Vec<Record> {
        self.run(&LATEST_VULNERABILITIES, limit).await
    }

    pub async fn most_critical_asset(&self) -> Vec<Record> {
        self.run(&MOST_CRITICAL_ASSET, None).await
    }
}
