use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

pub mod dashboard;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Dashboard server is running" }))
}

async fn health_check() -> &'static str {
    "OK"
}
