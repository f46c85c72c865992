//! Chat handlers
//!
//! Status, model catalog, message exchange and session history.
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use kbops_chat::{
    kb_id_preview, kb_status_label, ChatMessage, ChatMode, ChatSession, ChatSettings,
};
use kbops_core::is_demo_kb_id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Status
// ============================================================================

/// Connection and knowledge base status shown in the sidebar
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Credential probe result
    #[schema(example = "✅ AWS credentials configured")]
    pub credential_status: String,
    pub aws_available: bool,
    #[schema(example = "us-west-2")]
    pub region: String,
    /// Default knowledge base ID
    pub kb_id: String,
    /// "Real KB" or "Demo Mode"
    pub kb_status: String,
    /// First characters of the knowledge base ID
    pub kb_id_preview: String,
    /// Mode a message with the default settings would use
    #[schema(value_type = String, example = "demo_canned")]
    pub mode: ChatMode,
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "chat",
    responses(
        (status = 200, description = "Connection status", body = StatusResponse)
    )
)]
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let kb_id = state.config.knowledge_base.kb_id.clone();
    let aws = state.engine.aws_available();

    let mode = match (is_demo_kb_id(&kb_id), aws) {
        (true, true) => ChatMode::DemoModel,
        (true, false) => ChatMode::DemoCanned,
        (false, true) => ChatMode::KnowledgeBase,
        (false, false) => ChatMode::AwsRequired,
    };

    Json(StatusResponse {
        credential_status: state.credential_status.clone(),
        aws_available: aws,
        region: state.config.aws.region.clone(),
        kb_status: kb_status_label(&kb_id).to_string(),
        kb_id_preview: kb_id_preview(&kb_id),
        kb_id,
        mode,
    })
}

// ============================================================================
// Models
// ============================================================================

/// Slider range for a sampling parameter
#[derive(Debug, Serialize, ToSchema)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
    pub temperature: ParamRange,
    pub top_p: ParamRange,
}

#[utoipa::path(
    get,
    path = "/api/v1/models",
    tag = "chat",
    responses(
        (status = 200, description = "Model catalog and parameter ranges", body = ModelsResponse)
    )
)]
pub async fn models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let chat = &state.config.chat;

    Json(ModelsResponse {
        models: chat.models.clone(),
        default_model: chat.default_model.clone(),
        temperature: ParamRange {
            min: 0.0,
            max: 1.0,
            step: 0.1,
            default: chat.temperature,
        },
        top_p: ParamRange {
            min: 0.0,
            max: 1.0,
            step: 0.001,
            default: chat.top_p,
        },
    })
}

// ============================================================================
// Chat
// ============================================================================

/// One user message; unset fields fall back to the server defaults
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Continue an existing session; a new one is created when absent
    pub session_id: Option<Uuid>,

    #[schema(example = "What's the capacity of the DT1000 dump truck?")]
    pub message: String,

    pub kb_id: Option<String>,
    pub model_id: Option<String>,

    #[schema(example = 0.7)]
    pub temperature: Option<f32>,

    #[schema(example = 0.9)]
    pub top_p: Option<f32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub reply: String,
    #[schema(value_type = String, example = "knowledge_base")]
    pub mode: ChatMode,
    pub passages_found: usize,
    /// Full history, oldest first
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    fn settings(&self, state: &AppState) -> ChatSettings {
        let mut settings = ChatSettings::from_config(
            &state.config.chat,
            self.kb_id
                .clone()
                .unwrap_or_else(|| state.config.knowledge_base.kb_id.clone()),
        );
        if let Some(model) = &self.model_id {
            settings.model_id = model.clone();
        }
        if let Some(t) = self.temperature {
            settings.temperature = t;
        }
        if let Some(p) = self.top_p {
            settings.top_p = p;
        }
        settings
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Empty message or invalid settings", body = crate::error::ApiError),
        (status = 404, description = "Unknown session", body = crate::error::ApiError)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let settings = req.settings(&state);
    settings.validate(&state.config.chat.models)?;

    if let Some(id) = req.session_id {
        if !state.has_session(id).await {
            return Err(AppError::NotFound(format!("Session {id}")));
        }
    }

    tracing::info!(
        session = ?req.session_id,
        kb = %kb_status_label(&settings.kb_id),
        model = %settings.model_id,
        "chat message"
    );

    let reply = state.engine.respond(message, &settings).await;
    let session = state
        .record_exchange(req.session_id, message, &reply.content)
        .await;

    Ok(Json(ChatResponse {
        session_id: session.id,
        reply: reply.content,
        mode: reply.mode,
        passages_found: reply.passages_found,
        messages: session.messages,
    }))
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    /// RFC 3339 creation time
    pub created_at: String,
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
}

impl From<ChatSession> for SessionResponse {
    fn from(session: ChatSession) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at.to_rfc3339(),
            messages: session.messages,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session history", body = SessionResponse),
        (status = 404, description = "Unknown session", body = crate::error::ApiError)
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    state
        .session(id)
        .await
        .map(|s| Json(s.into()))
        .ok_or_else(|| AppError::NotFound(format!("Session {id}")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Session cleared"),
        (status = 404, description = "Unknown session", body = crate::error::ApiError)
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.remove_session(id).await {
        tracing::info!(session = %id, "chat history cleared");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id}")))
    }
}
