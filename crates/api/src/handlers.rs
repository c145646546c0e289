//! API request handlers
//!
//! Report handlers always answer 200 with a JSON array; failures have already
//! been replaced by the report's default.

use crate::SharedState;
use assetwatch_reports::CATALOGUE;
use assetwatch_warehouse::Record;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::debug;

type Rows = Json<Vec<Record>>;

/// Health check endpoint. Never touches the warehouse.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Backend is running"
    }))
}

/// List the report catalogue
pub async fn list_reports() -> impl IntoResponse {
    Json(CATALOGUE.as_slice())
}

/// Count of all assets
pub async fn total_assets(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.total_assets().await)
}

/// Count of assets in Active status
pub async fn active_assets(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.active_assets().await)
}

/// Asset counts per department
pub async fn assets_by_department(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.assets_by_department().await)
}

/// Count of all vulnerabilities
pub async fn total_vulnerabilities(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.total_vulnerabilities().await)
}

/// Vulnerability counts per severity
pub async fn vulnerabilities_by_severity(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.vulnerabilities_by_severity().await)
}

/// Mean vulnerability risk score, one decimal
pub async fn average_risk_score(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.average_risk_score().await)
}

/// Assets purchased per calendar month
pub async fn assets_by_month(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.assets_by_month().await)
}

/// Asset counts per type, largest first
pub async fn assets_by_type_donut(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.assets_by_type_donut().await)
}

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<String>,
}

impl LimitQuery {
    /// Unparseable limits fall back to the report default
    fn limit(&self) -> Option<u32> {
        let raw = self.limit.as_deref()?;
        match raw.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                debug!(limit = raw, "Ignoring invalid limit");
                None
            }
        }
    }
}

/// Newest vulnerabilities, honouring `?limit=`
pub async fn latest_vulnerabilities(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Rows {
    Json(state.reporter.latest_vulnerabilities(query.limit()).await)
}

/// Critical assets, most recently purchased first
pub async fn most_critical_asset(State(state): State<SharedState>) -> Rows {
    Json(state.reporter.most_critical_asset().await)
}
