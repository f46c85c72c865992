//! Foundation model commands
//!
//! Author: hephaex@gmail.com

use crate::commands::aws;
use crate::output::{mark, preview};
use clap::Subcommand;
use kbops_aws::{BedrockLlm, FoundationModels};
use kbops_core::{AppConfig, GenerationParams, LlmClient};

const TEST_PROMPT: &str = "What is heavy machinery?";

#[derive(Subcommand)]
pub enum ModelsCommand {
    /// List foundation models and mark the configured ones
    List,
    /// Invoke a model with a short prompt
    Test {
        /// Model ID; defaults to the configured default model
        #[arg(long)]
        model: Option<String>,
    },
}

pub async fn run(config: &AppConfig, command: ModelsCommand) -> anyhow::Result<()> {
    let ctx = aws(config).await;
    match command {
        ModelsCommand::List => {
            let ids = FoundationModels::new(&ctx).list_ids().await?;
            println!("🤖 {} foundation models in {}", ids.len(), ctx.region());
            for model in &config.chat.models {
                println!("   {} {model}", mark(ids.contains(model)));
            }
            Ok(())
        }
        ModelsCommand::Test { model } => {
            let params = GenerationParams {
                model_id: model.unwrap_or_else(|| config.chat.default_model.clone()),
                temperature: config.chat.temperature,
                top_p: config.chat.top_p,
                max_tokens: 100,
            };

            println!("🤖 Testing {}", params.model_id);
            let reply = BedrockLlm::new(&ctx).generate(TEST_PROMPT, &params).await?;
            println!("✅ Model responded");
            println!("   Response: {}", preview(&reply, 200));
            Ok(())
        }
    }
}
