//! The fixed report catalogue

use assetwatch_warehouse::{Dialect, Record};
use serde::Serialize;

/// Row bound applied to a report's statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    /// Always this many rows at most; requests cannot change it
    Fixed(u32),
    /// Caller may pick a limit in `1..=max`
    Adjustable { default: u32, max: u32 },
}

impl Bound {
    pub fn resolve(self, requested: Option<u32>) -> Option<u32> {
        match self {
            Bound::Unbounded => None,
            Bound::Fixed(n) => Some(n),
            Bound::Adjustable { default, max } => Some(requested.unwrap_or(default).clamp(1, max)),
        }
    }
}

/// SQL text, shared or per dialect
#[derive(Debug, Clone, Copy)]
pub enum Statement {
    Portable(&'static str),
    PerDialect {
        snowflake: &'static str,
        sqlite: &'static str,
    },
}

impl Statement {
    fn text(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (Statement::Portable(sql), _) => sql,
            (Statement::PerDialect { snowflake, .. }, Dialect::Snowflake) => snowflake,
            (Statement::PerDialect { sqlite, .. }, Dialect::Sqlite) => sqlite,
        }
    }
}

/// What a report serves when its query fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// `[{<column>: 0}]`
    ZeroMetric(&'static str),
    /// `[]`
    Empty,
}

impl Fallback {
    pub fn rows(self) -> Vec<Record> {
        match self {
            Fallback::ZeroMetric(column) => {
                let mut record = Record::new();
                record.insert(column.to_string(), 0.into());
                vec![record]
            }
            Fallback::Empty => Vec::new(),
        }
    }
}

/// A named report: one fixed statement and its failure default
#[derive(Debug, Serialize)]
pub struct ReportDefinition {
    pub name: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub statement: Statement,
    #[serde(skip)]
    pub bound: Bound,
    #[serde(skip)]
    pub fallback: Fallback,
}

impl ReportDefinition {
    /// Final SQL for a dialect, with the resolved LIMIT appended
    pub fn sql(&self, dialect: Dialect, requested_limit: Option<u32>) -> String {
        let base = self.statement.text(dialect).trim();
        match self.bound.resolve(requested_limit) {
            Some(limit) => format!("{}\nLIMIT {}", base, limit),
            None => base.to_string(),
        }
    }

    pub fn fallback_rows(&self) -> Vec<Record> {
        self.fallback.rows()
    }
}

pub static TOTAL_ASSETS: ReportDefinition = ReportDefinition {
    name: "total_assets",
    path: "/total-assets",
    description: "Count of all assets",
    statement: Statement::Portable("SELECT COUNT(*) AS total FROM assets"),
    bound: Bound::Unbounded,
    fallback: Fallback::ZeroMetric("total"),
};

pub static ACTIVE_ASSETS: ReportDefinition = ReportDefinition {
    name: "active_assets",
    path: "/active-assets",
    description: "Count of assets with Active status",
    statement: Statement::Portable(
        "SELECT COUNT(*) AS active_assets
         FROM assets
         WHERE ASSET_STATUS = 'Active'",
    ),
    bound: Bound::Unbounded,
    fallback: Fallback::ZeroMetric("active_assets"),
};

pub static ASSETS_BY_DEPARTMENT: ReportDefinition = ReportDefinition {
    name: "assets_by_department",
    path: "/assets-department",
    description: "Asset count per department",
    statement: Statement::Portable(
        "SELECT department, COUNT(*) AS total
         FROM assets
         GROUP BY department",
    ),
    bound: Bound::Unbounded,
    fallback: Fallback::Empty,
};

pub static TOTAL_VULNERABILITIES: ReportDefinition = ReportDefinition {
    name: "total_vulnerabilities",
    path: "/total-vulnerabilities",
    description: "Count of all vulnerabilities",
    statement: Statement::Portable(
        "SELECT COUNT(*) AS total_vulnerabilities
         FROM vulnerabilities",
    ),
    bound: Bound::Unbounded,
    fallback: Fallback::ZeroMetric("total_vulnerabilities"),
};

pub static VULNERABILITIES_BY_SEVERITY: ReportDefinition = ReportDefinition {
    name: "vulnerabilities_by_severity",
    path: "/vulnerabilities-severity",
    description: "Vulnerability count per severity",
    statement: Statement::Portable(
        "SELECT severity, COUNT(*) AS total
         FROM vulnerabilities
         GROUP BY severity",
    ),
    bound: Bound::Unbounded,
    fallback: Fallback::Empty,
};

pub static AVERAGE_RISK_SCORE: ReportDefinition = ReportDefinition {
    name: "average_risk_score",
    path: "/average-risk",
    description: "Mean vulnerability risk score, one decimal",
    statement: Statement::Portable(
        "SELECT COALESCE(ROUND(AVG(RISK_SCORE), 1), 0) AS avg_risk
         FROM vulnerabilities",
    ),
    bound: Bound::Unbounded,
    fallback: Fallback::ZeroMetric("avg_risk"),
};

pub static ASSETS_BY_MONTH: ReportDefinition = ReportDefinition {
    name: "assets_by_month",
    path: "/assets-monthly",
    description: "Assets purchased per calendar month",
    statement: Statement::PerDialect {
        snowflake: "SELECT
                MONTH(purchase_date) AS month_number,
                TO_VARCHAR(purchase_date, 'Mon') AS month,
                COUNT(*) AS total_assets
            FROM assets
            WHERE purchase_date IS NOT NULL
            GROUP BY 1, 2
            ORDER BY 1",
        sqlite: "SELECT
                CAST(strftime('%m', purchase_date) AS INTEGER) AS month_number,
                substr('JanFebMarAprMayJunJulAugSepOctNovDec',
                       CAST(strftime('%m', purchase_date) AS INTEGER) * 3 - 2, 3) AS month,
                COUNT(*) AS total_assets
            FROM assets
            WHERE purchase_date IS NOT NULL
            GROUP BY 1, 2
            ORDER BY 1",
    },
    bound: Bound::Unbounded,
    fallback: Fallback::Empty,
};

pub static ASSETS_BY_TYPE_DONUT: ReportDefinition = ReportDefinition {
    name: "assets_by_type_donut",
    path: "/assets-type-donut",
    description: "Asset count per type, largest first",
    statement: Statement::Portable(
        "SELECT
            asset_type,
            COUNT(*) AS total_assets
         FROM assets
         GROUP BY asset_type
         ORDER BY total_assets DESC",
    ),
    bound: Bound::Unbounded,
    fallback: Fallback::Empty,
};

pub static LATEST_VULNERABILITIES: ReportDefinition = ReportDefinition {
    name: "latest_vulnerabilities",
    path: "/latest-vulnerabilities",
    description: "Most recently detected vulnerabilities",
    statement: Statement::Portable(
        "SELECT
            vulnerability_id,
            cve_id,
            detected_date,
            severity,
            status
         FROM vulnerabilities
         ORDER BY detected_date DESC",
    ),
    bound: Bound::Adjustable {
        default: 10,
        max: 100,
    },
    fallback: Fallback::Empty,
};

pub static MOST_CRITICAL_ASSET: ReportDefinition = ReportDefinition {
    name: "most_critical_asset",
    path: "/most-critical-asset",
    description: "Critical assets, most recently purchased first",
    statement: Statement::Portable(
        "SELECT
            hostname,
            department,
            criticality,
            purchase_date
         FROM assets
         WHERE criticality = 'Critical'
         ORDER BY purchase_date DESC",
    ),
    bound: Bound::Fixed(10),
    fallback: Fallback::Empty,
};

/// Every report, in dashboard order
pub static CATALOGUE: [&ReportDefinition; 10] = [
    &TOTAL_ASSETS,
    &ACTIVE_ASSETS,
    &ASSETS_BY_DEPARTMENT,
    &TOTAL_VULNERABILITIES,
    &VULNERABILITIES_BY_SEVERITY,
    &AVERAGE_RISK_SCORE,
    &ASSETS_BY_MONTH,
    &ASSETS_BY_TYPE_DONUT,
    &LATEST_VULNERABILITIES,
    &MOST_CRITICAL_ASSET,
];

/// Look a report up by name
pub fn find(name: &str) -> Option<&'static ReportDefinition> {
    CATALOGUE.iter().copied().find(|r| r.name == name)
}
