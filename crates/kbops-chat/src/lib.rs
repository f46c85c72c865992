//! kbops Chat - Heavy machinery chat dispatch
//!
//! Routes each user message to one of four paths depending on whether a
//! real knowledge base ID is configured and whether AWS is reachable:
//!
//! | KB ID       | AWS         | Path                                      |
//! |-------------|-------------|-------------------------------------------|
//! | placeholder | available   | model call with the demo equipment context |
//! | placeholder | unavailable | canned demo response                      |
//! | real        | available   | retrieval, then a grounded model call     |
//! | real        | unavailable | "AWS connection required" notice          |
//!
//! Failures never escape [`ChatEngine::respond`]; they become assistant text.
//!
//! Author: hephaex@gmail.com

use kbops_core::{
    is_demo_kb_id, CallerIdentity, ChatConfig, ErrorKind, GenerationParams, KbError,
    KnowledgeBaseRetriever, LlmClient, Result, DEMO_KB_ID,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod prompts;
pub mod session;
pub mod validation;

pub use session::{ChatMessage, ChatRole, ChatSession};
pub use validation::validate_prompt;

// ============================================================================
// Settings
// ============================================================================

/// Per-message settings chosen in the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    pub kb_id: String,
    pub model_id: String,
    pub temperature: f32,
    pub top_p: f32,
}

impl ChatSettings {
    /// Defaults from configuration, with the given knowledge base ID
    pub fn from_config(config: &ChatConfig, kb_id: impl Into<String>) -> Self {
        Self {
            kb_id: kb_id.into(),
            model_id: config.default_model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }

    /// Check the model against the catalog and the sliders' ranges and steps
    pub fn validate(&self, models: &[String]) -> Result<()> {
        if !models.iter().any(|m| m == &self.model_id) {
            return Err(KbError::Validation(format!(
                "unknown model {}; choose one of: {}",
                self.model_id,
                models.join(", ")
            )));
        }
        if !on_grid(self.temperature, 10.0) {
            return Err(KbError::Validation(format!(
                "temperature must be between 0 and 1 in steps of 0.1, got {}",
                self.temperature
            )));
        }
        if !on_grid(self.top_p, 1000.0) {
            return Err(KbError::Validation(format!(
                "top_p must be between 0 and 1 in steps of 0.001, got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// `value` lies in [0, 1] on a grid of 1/steps
fn on_grid(value: f32, steps: f32) -> bool {
    if !(0.0..=1.0).contains(&value) {
        return false;
    }
    let scaled = value * steps;
    (scaled - scaled.round()).abs() < 1e-3
}

// ============================================================================
// Replies
// ============================================================================

/// Which path produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Placeholder KB, model called with the demo context
    DemoModel,
    /// Placeholder KB, no AWS: canned response
    DemoCanned,
    /// Real KB, retrieval plus model call
    KnowledgeBase,
    /// Real KB, no AWS
    AwsRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    pub mode: ChatMode,
    pub passages_found: usize,
}

impl ChatReply {
    fn new(content: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            content: content.into(),
            mode,
            passages_found: 0,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Region and bucket quoted in user-facing texts
#[derive(Debug, Clone)]
pub struct Deployment {
    pub region: String,
    pub bucket: String,
}

/// Chat dispatcher
pub struct ChatEngine {
    llm: Option<Arc<dyn LlmClient>>,
    retriever: Option<Arc<dyn KnowledgeBaseRetriever>>,
    config: ChatConfig,
    deployment: Deployment,
}

impl ChatEngine {
    /// Engine with AWS clients available
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<dyn KnowledgeBaseRetriever>,
        config: ChatConfig,
        deployment: Deployment,
    ) -> Self {
        Self {
            llm: Some(llm),
            retriever: Some(retriever),
            config,
            deployment,
        }
    }

    /// Engine without AWS; only the canned and notice paths are reachable
    pub fn offline(config: ChatConfig, deployment: Deployment) -> Self {
        Self {
            llm: None,
            retriever: None,
            config,
            deployment,
        }
    }

    pub fn aws_available(&self) -> bool {
        self.llm.is_some() && self.retriever.is_some()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Produce the assistant reply for one user message
    pub async fn respond(&self, prompt: &str, settings: &ChatSettings) -> ChatReply {
        let demo = is_demo_kb_id(&settings.kb_id);

        match (demo, &self.llm, &self.retriever) {
            (true, Some(llm), _) => self.respond_demo(llm.as_ref(), prompt, settings).await,
            (true, None, _) => ChatReply::new(
                prompts::canned_demo_response(
                    prompt,
                    &self.deployment.bucket,
                    &self.deployment.region,
                ),
                ChatMode::DemoCanned,
            ),
            (false, Some(llm), Some(retriever)) => {
                self.respond_kb(llm.as_ref(), retriever.as_ref(), prompt, settings)
                    .await
            }
            (false, _, _) => ChatReply::new(
                prompts::aws_required(&settings.kb_id, DEMO_KB_ID),
                ChatMode::AwsRequired,
            ),
        }
    }

    async fn respond_demo(
        &self,
        llm: &dyn LlmClient,
        prompt: &str,
        settings: &ChatSettings,
    ) -> ChatReply {
        if !validate_prompt(prompt) {
            return ChatReply::new(prompts::SPECIALIST_REDIRECT, ChatMode::DemoModel);
        }

        let full_prompt = prompts::demo_prompt(prompt);
        match llm.generate(&full_prompt, &self.params(settings)).await {
            Ok(text) => ChatReply::new(text, ChatMode::DemoModel),
            Err(e) => {
                tracing::warn!(error = %e, "demo generation failed");
                ChatReply::new(prompts::demo_error(&e.to_string()), ChatMode::DemoModel)
            }
        }
    }

    async fn respond_kb(
        &self,
        llm: &dyn LlmClient,
        retriever: &dyn KnowledgeBaseRetriever,
        prompt: &str,
        settings: &ChatSettings,
    ) -> ChatReply {
        if !validate_prompt(prompt) {
            return ChatReply::new(prompts::INVALID_QUERY, ChatMode::KnowledgeBase);
        }

        tracing::info!(kb_id = %settings.kb_id, "querying knowledge base");

        match self.retrieve_and_answer(llm, retriever, prompt, settings).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(kb_id = %settings.kb_id, error = %e, "knowledge base chat failed");
                let content = match e.kind() {
                    ErrorKind::NotFound => {
                        prompts::kb_not_found(&settings.kb_id, &self.deployment.region)
                    }
                    ErrorKind::AccessDenied => prompts::kb_access_denied(&settings.kb_id),
                    ErrorKind::Other => prompts::kb_error(&e.to_string()),
                };
                ChatReply::new(content, ChatMode::KnowledgeBase)
            }
        }
    }

    async fn retrieve_and_answer(
        &self,
        llm: &dyn LlmClient,
        retriever: &dyn KnowledgeBaseRetriever,
        prompt: &str,
        settings: &ChatSettings,
    ) -> Result<ChatReply> {
        let passages = retriever
            .retrieve(&settings.kb_id, prompt, self.config.number_of_results)
            .await?;

        if passages.is_empty() {
            return Ok(ChatReply::new(
                prompts::no_results(prompt),
                ChatMode::KnowledgeBase,
            ));
        }

        tracing::info!(found = passages.len(), "relevant documents found");

        let context = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let full_prompt = prompts::knowledge_base_prompt(&context, prompt);

        tracing::debug!(prompt_len = full_prompt.len(), "calling model");
        let answer = llm.generate(&full_prompt, &self.params(settings)).await?;

        Ok(ChatReply {
            content: answer,
            mode: ChatMode::KnowledgeBase,
            passages_found: passages.len(),
        })
    }

    fn params(&self, settings: &ChatSettings) -> GenerationParams {
        GenerationParams {
            model_id: settings.model_id.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: self.config.max_tokens,
        }
    }
}

// ============================================================================
// Status helpers
// ============================================================================

/// "Real KB" or "Demo Mode"
pub fn kb_status_label(kb_id: &str) -> &'static str {
    if is_demo_kb_id(kb_id) {
        "Demo Mode"
    } else {
        "Real KB"
    }
}

/// First eight characters of the ID followed by `...`
pub fn kb_id_preview(kb_id: &str) -> String {
    let head: String = kb_id.chars().take(8).collect();
    format!("{head}...")
}

/// Status line for the start-up credential probe
pub fn credential_status(probe: &Result<CallerIdentity>) -> String {
    match probe {
        Ok(_) => "✅ AWS credentials configured".to_string(),
        Err(e) => format!("⚠️ AWS credentials issue: {e}"),
    }
}

// ============================================================================
// Tests
// ============================================================================
