//! Terminal chat
//!
//! Same dispatch as the web UI: the knowledge base ID selects demo or
//! grounded answers, and a failed credential probe selects offline mode.
//!
//! Author: hephaex@gmail.com

use crate::commands::aws;
use clap::Args;
use kbops_aws::{BedrockLlm, BedrockRetriever, StsIdentity};
use kbops_chat::{credential_status, kb_status_label, ChatEngine, ChatSession, ChatSettings, Deployment};
use kbops_core::{AppConfig, IdentityProbe};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args)]
pub struct ChatArgs {
    /// Knowledge base ID; the configured one when omitted
    #[arg(long)]
    pub kb_id: Option<String>,
    /// Model ID
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub top_p: Option<f32>,
}

impl ChatArgs {
    fn settings(&self, config: &AppConfig) -> ChatSettings {
        let kb_id = self
            .kb_id
            .clone()
            .unwrap_or_else(|| config.knowledge_base.kb_id.clone());
        let mut settings = ChatSettings::from_config(&config.chat, kb_id);
        if let Some(model) = &self.model {
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

pub async fn run(config: &AppConfig, args: ChatArgs) -> anyhow::Result<()> {
    let settings = args.settings(config);
    settings.validate(&config.chat.models)?;

    let ctx = aws(config).await;
    let identity = StsIdentity::new(&ctx).caller_identity().await;
    println!("{}", credential_status(&identity));

    let deployment = Deployment {
        region: ctx.region().to_string(),
        bucket: config.knowledge_base.s3_bucket.clone(),
    };
    let engine = match identity {
        Ok(_) => ChatEngine::new(
            Arc::new(BedrockLlm::new(&ctx)),
            Arc::new(BedrockRetriever::new(&ctx)),
            config.chat.clone(),
            deployment,
        ),
        Err(_) => ChatEngine::offline(config.chat.clone(), deployment),
    };

    println!("🏗️ Heavy Machinery Assistant ({})", kb_status_label(&settings.kb_id));
    println!("   Model: {}", settings.model_id);
    println!("   Type a question, or `exit` to quit.\n");

    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "exit" | "quit") {
            break;
        }

        session.push_user(prompt);
        let reply = engine.respond(prompt, &settings).await;
        tracing::debug!(mode = ?reply.mode, passages = reply.passages_found, "reply");
        println!("\n{}\n", reply.content);
        session.push_assistant(reply.content);
    }

    println!("👋 {} messages exchanged", session.len());
    Ok(())
}
