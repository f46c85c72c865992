//! API Integration Tests
//!
//! The router runs against an offline state (demo and notice paths) or a
//! state whose engine uses in-process mock clients; nothing here needs AWS.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kbops_api::{create_router, create_router_for_testing, state::AppState};
use kbops_chat::{ChatEngine, Deployment};
use kbops_core::{
    AppConfig, GenerationParams, KnowledgeBaseRetriever, LlmClient, Result, RetrievedPassage,
    DEMO_KB_ID,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, create_json_request("GET", uri, None)).await
}

async fn post_chat(app: &Router, body: Value) -> (StatusCode, Value) {
    send(app, create_json_request("POST", "/api/v1/chat", Some(body))).await
}

// =============================================================================
// Mock AWS clients
// =============================================================================

struct CannedLlm;

#[async_trait]
impl LlmClient for CannedLlm {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let grounded = prompt.contains("Context: ");
        Ok(format!(
            "[{}] grounded={grounded} t={}",
            params.model_id, params.temperature
        ))
    }
}

struct OnePassage;

#[async_trait]
impl KnowledgeBaseRetriever for OnePassage {
    async fn retrieve(
        &self,
        _kb_id: &str,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        Ok(vec![RetrievedPassage {
            text: "DT1000 payload: 100 t".to_string(),
            score: Some(0.91),
            source_uri: Some("s3://bedrock-kb-133720367604/documents/dt1000.pdf".to_string()),
        }])
    }
}

fn online_router() -> Router {
    let config = AppConfig::default();
    let engine = ChatEngine::new(
        Arc::new(CannedLlm),
        Arc::new(OnePassage),
        config.chat.clone(),
        Deployment {
            region: config.aws.region.clone(),
            bucket: config.knowledge_base.s3_bucket.clone(),
        },
    );
    create_router(Arc::new(AppState::new(
        config,
        engine,
        "✅ AWS credentials configured",
    )))
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();
    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();
    let (status, json) = get_json(&app, "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["aws"], false);
    assert_eq!(json["checks"]["knowledge_base"], false);
}

#[tokio::test]
async fn test_readiness_cleared_on_shutdown() {
    let state = Arc::new(AppState::offline(AppConfig::default(), "not probed"));
    let app = create_router(state.clone());
    state.set_ready(false);

    let (status, json) = get_json(&app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);

    // Liveness is unaffected
    let (status, _) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_counts_requests() {
    let app = create_router_for_testing();
    get_json(&app, "/health").await;
    get_json(&app, "/health").await;

    let (status, json) = get_json(&app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["uptime_seconds"].is_number());
    assert!(json["total_requests"].as_u64().unwrap() >= 2);
    assert_eq!(json["active_sessions"], 0);
    assert_eq!(json["aws_available"], false);
}

#[tokio::test]
async fn test_security_headers_on_api() {
    let app = create_router_for_testing();
    let response = app
        .oneshot(create_json_request("GET", "/api/v1/status", None))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get("content-security-policy").is_some());
}

// =============================================================================
// Status and Models
// =============================================================================

#[tokio::test]
async fn test_status_offline_demo() {
    let app = create_router_for_testing();
    let (status, json) = get_json(&app, "/api/v1/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["aws_available"], false);
    assert_eq!(json["kb_id"], DEMO_KB_ID);
    assert_eq!(json["kb_status"], "Demo Mode");
    assert_eq!(json["kb_id_preview"], "your-kno...");
    assert_eq!(json["mode"], "demo_canned");
    assert_eq!(json["region"], "us-west-2");
    assert!(json["credential_status"]
        .as_str()
        .unwrap()
        .starts_with("⚠️ AWS credentials issue"));
}

#[tokio::test]
async fn test_status_online_demo() {
    let app = online_router();
    let (_, json) = get_json(&app, "/api/v1/status").await;

    assert_eq!(json["aws_available"], true);
    assert_eq!(json["mode"], "demo_model");
    assert_eq!(json["credential_status"], "✅ AWS credentials configured");
}

#[tokio::test]
async fn test_models_catalog() {
    let app = create_router_for_testing();
    let (status, json) = get_json(&app, "/api/v1/models").await;

    assert_eq!(status, StatusCode::OK);
    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(json["default_model"], "anthropic.claude-3-haiku-20240307-v1:0");
    assert_eq!(json["temperature"]["max"], 1.0);
    assert_eq!(json["temperature"]["default"], 1.0);
    assert!((json["top_p"]["step"].as_f64().unwrap() - 0.001).abs() < 1e-6);
}

// =============================================================================
// Chat Tests
// =============================================================================

#[tokio::test]
async fn test_chat_offline_demo_round_trip() {
    let app = create_router_for_testing();

    let (status, json) = post_chat(
        &app,
        json!({ "message": "Tell me about the BD850 bulldozer" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "demo_canned");
    assert_eq!(json["passages_found"], 0);
    assert!(json["reply"]
        .as_str()
        .unwrap()
        .contains("**Your Question**: \"Tell me about the BD850 bulldozer\""));

    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert!(json["session_id"].is_string());
}

#[tokio::test]
async fn test_chat_real_kb_offline_requires_aws() {
    let app = create_router_for_testing();

    let (status, json) = post_chat(
        &app,
        json!({ "message": "crane boom length", "kb_id": "L3CRT5Q79H" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "aws_required");
    assert!(json["reply"]
        .as_str()
        .unwrap()
        .contains("AWS Connection Required"));
}

#[tokio::test]
async fn test_chat_online_knowledge_base() {
    let app = online_router();

    let (status, json) = post_chat(
        &app,
        json!({
            "message": "What's the capacity of the DT1000 dump truck?",
            "kb_id": "L3CRT5Q79H",
            "model_id": "anthropic.claude-3-5-sonnet-20240620-v1:0",
            "temperature": 0.3
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "knowledge_base");
    assert_eq!(json["passages_found"], 1);
    assert_eq!(
        json["reply"],
        "[anthropic.claude-3-5-sonnet-20240620-v1:0] grounded=true t=0.3"
    );
}

#[tokio::test]
async fn test_chat_session_history() {
    let app = create_router_for_testing();

    let (_, first) = post_chat(&app, json!({ "message": "excavator reach?" })).await;
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let (status, second) = post_chat(
        &app,
        json!({ "session_id": session_id, "message": "and the forklift?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["session_id"], session_id.as_str());
    assert_eq!(second["messages"].as_array().unwrap().len(), 4);

    let (status, history) = get_json(&app, &format!("/api/v1/sessions/{session_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["content"], "and the forklift?");
    assert!(history["created_at"].is_string());
}

#[tokio::test]
async fn test_delete_session() {
    let app = create_router_for_testing();

    let (_, json) = post_chat(&app, json!({ "message": "forklift capacity" })).await;
    let uri = format!("/api/v1/sessions/{}", json["session_id"].as_str().unwrap());

    let (status, _) = send(&app, create_json_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get_json(&app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, create_json_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[tokio::test]
async fn test_chat_empty_message() {
    let app = create_router_for_testing();
    let (status, json) = post_chat(&app, json!({ "message": "   " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_chat_unknown_model() {
    let app = create_router_for_testing();
    let (status, json) = post_chat(
        &app,
        json!({ "message": "dozer blade", "model_id": "amazon.titan-text-express-v1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("unknown model"));
}

#[tokio::test]
async fn test_chat_parameters_off_grid() {
    let app = create_router_for_testing();

    let (status, _) = post_chat(&app, json!({ "message": "dozer", "temperature": 0.25 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_chat(&app, json!({ "message": "dozer", "top_p": 1.2 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_unknown_session() {
    let app = create_router_for_testing();
    let (status, json) = post_chat(
        &app,
        json!({
            "session_id": "5f0c6a57-3b1e-4f43-9c1d-2a4f4b0f1e11",
            "message": "crane"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_ui_retries_expired_session() {
    let app = create_router_for_testing();

    // The page clears its session and resends the same prompt after a 404
    let expired = json!({
        "session_id": "5f0c6a57-3b1e-4f43-9c1d-2a4f4b0f1e11",
        "message": "crane"
    });
    let (status, _) = post_chat(&app, expired).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = post_chat(&app, json!({ "session_id": null, "message": "crane" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(json["session_id"], "5f0c6a57-3b1e-4f43-9c1d-2a4f4b0f1e11");
    assert_eq!(json["messages"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/static/app.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let script = String::from_utf8(body.to_vec()).unwrap();
    assert!(script.contains("res.status === 404 && body.session_id"));
}

#[tokio::test]
async fn test_chat_malformed_json() {
    let app = create_router_for_testing();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"message\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

// =============================================================================
// UI and Documentation
// =============================================================================

#[tokio::test]
async fn test_ui_assets_served() {
    let app = create_router_for_testing();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Heavy Machinery AI Assistant"));
    assert!(html.contains("/static/app.js"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/static/app.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/javascript"));
}

#[tokio::test]
async fn test_swagger_ui_available() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/swagger-ui/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Swagger UI should redirect or return HTML
    assert!(
        response.status() == StatusCode::OK || response.status() == StatusCode::MOVED_PERMANENTLY
    );
}

#[tokio::test]
async fn test_openapi_spec_available() {
    let app = create_router_for_testing();
    let (status, json) = get_json(&app, "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["openapi"].is_string());
    assert!(json["info"].is_object());
    assert!(json["paths"]["/api/v1/chat"].is_object());
    assert!(json["paths"]["/api/v1/sessions/{id}"].is_object());
}
