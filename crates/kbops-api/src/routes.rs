//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::{chat, health, ui};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(chat::status))
        .route("/models", get(chat::models))
        .route("/chat", post(chat::chat))
        .route(
            "/sessions/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
}

/// Probe and counter routes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
}

/// Browser UI
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(ui::index))
        .route("/static/app.js", get(ui::app_js))
        .route("/static/style.css", get(ui::style_css))
}
