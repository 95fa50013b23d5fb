//! Health check and store probe endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
///
/// Does not touch the contact store.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "idlink-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize)]
pub struct TestDbResponse {
    pub success: bool,
    pub time: String,
    pub version: String,
}

/// GET /testdb
///
/// Store connectivity probe: current store time and version.
pub async fn test_db(State(state): State<AppState>) -> ApiResult<Json<TestDbResponse>> {
    let probe = state.identity.probe().await?;

    Ok(Json(TestDbResponse {
        success: true,
        time: probe.time,
        version: probe.version,
    }))
}
