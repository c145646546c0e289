//! AssetWatch Web API
//!
//! Axum router exposing one read-only endpoint per report.

mod handlers;
mod routes;

pub use routes::create_router;

use assetwatch_reports::Reporter;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub reporter: Reporter,
}

impl AppState {
    pub fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }
}

pub type SharedState = Arc<AppState>;
