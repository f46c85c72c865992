//! kbops API - Heavy machinery chat server
//!
//! Serves the browser chat UI and a JSON API over the chat dispatcher,
//! with an OpenAPI document and Swagger UI.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use crate::handlers::{chat, health};
use crate::middleware::{request_counter_middleware, security_headers_middleware};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use kbops_core::AppConfig;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "kbops chat API",
        description = "Heavy machinery assistant backed by Amazon Bedrock knowledge bases"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics,
        chat::status,
        chat::models,
        chat::chat,
        chat::get_session,
        chat::delete_session,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        health::BuildInfo,
        health::ReadinessResponse,
        health::ReadinessChecks,
        health::MetricsResponse,
        chat::StatusResponse,
        chat::ParamRange,
        chat::ModelsResponse,
        chat::ChatRequest,
        chat::ChatResponse,
        chat::SessionResponse,
    )),
    tags(
        (name = "health", description = "Liveness, readiness and counters"),
        (name = "chat", description = "Chat with the equipment assistant")
    )
)]
pub struct ApiDoc;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let app = Router::new()
        .merge(routes::ui_routes())
        .merge(routes::health_routes())
        .nest("/api/v1", routes::api_routes())
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_counter_middleware,
        ))
        .with_state(state);

    app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Router over an offline state with default configuration
pub fn create_router_for_testing() -> Router {
    let state = AppState::offline(
        AppConfig::default(),
        "⚠️ AWS credentials issue: not checked",
    );
    create_router(Arc::new(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
