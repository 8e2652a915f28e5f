pub mod ai;
pub mod config;
pub mod cycle;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod routes;
pub mod shutdown;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ai::GeminiClient;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub ai: Arc<GeminiClient>,
}

impl AppState {
    pub fn new(pool: PgPool, ai: GeminiClient) -> Self {
        Self {
            pool,
            ai: Arc::new(ai),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::users::routes(state.clone()))
        .merge(routes::cycle::routes(state.clone()))
        .merge(routes::cycle_stats::routes(state.clone()))
        .merge(routes::symptoms::routes(state.clone()))
        .merge(routes::insights::routes(state.clone()))
        .merge(routes::chat::routes(state.clone()))
        .merge(routes::consultations::routes(state.clone()))
        .merge(routes::reminders::routes(state.clone()))
        .merge(routes::reports::routes(state.clone()))
        .merge(routes::admin::routes(state))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "✅ Backend up" }))
}
