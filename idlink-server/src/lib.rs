//! idlink-server library - contact identity resolution service
//!
//! Links contact records that share an email or phone number into identity
//! clusters (one primary plus its secondaries) and serves the consolidated
//! view over HTTP.

use std::time::Duration;

use axum::Router;
use idlink_common::db::SqliteContactStore;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod identity;

use identity::IdentityService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService<SqliteContactStore>,
}

impl AppState {
    /// Create new application state
    pub fn new(store: SqliteContactStore, max_lock_wait: Duration) -> Self {
        Self {
            identity: IdentityService::new(store, max_lock_wait),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    Router::new()
        .route("/identify", post(api::identify))
        .route(
            "/contacts",
            get(api::list_contacts).delete(api::delete_all_contacts),
        )
        .route("/contacts/:id", delete(api::delete_contact))
        .route("/testdb", get(api::test_db))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
