//! Bedrock model invocation
//!
//! Calls Anthropic Claude models through the Bedrock runtime
//! `InvokeModel` API using the messages request format.
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, AwsContext};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use kbops_core::{GenerationParams, KbError, LlmClient, Result};
use serde::{Deserialize, Serialize};

/// Anthropic API version accepted by Bedrock
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    #[allow(dead_code)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl<'a> AnthropicRequest<'a> {
    pub(crate) fn new(prompt: &'a str, params: &GenerationParams) -> Self {
        Self {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock {
                    kind: "text",
                    text: prompt,
                }],
            }],
        }
    }
}

impl AnthropicResponse {
    /// Concatenated text blocks
    pub(crate) fn into_text(self) -> Result<String> {
        let text: String = self
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(KbError::Llm("No response generated".to_string()));
        }
        Ok(text)
    }
}

// ============================================================================
// Client
// ============================================================================

/// Bedrock runtime client for Anthropic models
#[derive(Clone, Debug)]
pub struct BedrockLlm {
    client: aws_sdk_bedrockruntime::Client,
}

impl BedrockLlm {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_bedrockruntime::Client::new(ctx.sdk_config()),
        }
    }
}

#[async_trait]
impl LlmClient for BedrockLlm {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = serde_json::to_vec(&AnthropicRequest::new(prompt, params))?;

        tracing::debug!(model = %params.model_id, prompt_len = prompt.len(), "invoking model");

        let out = self
            .client
            .invoke_model()
            .model_id(&params.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-runtime", e))?;

        let body: Option<&Blob> = out.body().into();
        let bytes = body.map(|b| b.as_ref()).unwrap_or_default();
        let response: AnthropicResponse = serde_json::from_slice(bytes)
            .map_err(|e| KbError::Llm(format!("Failed to parse response: {e}")))?;

        response.into_text()
    }
}

// ============================================================================
// Tests
// ============================================================================
