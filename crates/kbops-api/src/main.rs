//! kbops API Server
//!
//! Chat server for the heavy machinery knowledge base. Probes AWS
//! credentials once at start-up and falls back to demo mode when they are
//! unavailable.
//!
//! Author: hephaex@gmail.com

use kbops_api::{create_router, state::deployment, state::AppState};
use kbops_aws::{AwsContext, BedrockLlm, BedrockRetriever, StsIdentity};
use kbops_chat::{credential_status, ChatEngine};
use kbops_core::{AppConfig, IdentityProbe, KbError, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; KBOPS_CONFIG points at an optional TOML file
    let config_path = std::env::var_os("KBOPS_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    init_tracing(&config.logging);

    let state = Arc::new(build_state(config.clone()).await);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("kbops chat server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kbops_api={0},kbops_chat={0},kbops_aws={0},tower_http={0}",
            logging.level
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Probe STS and build the chat engine; any failure selects offline mode
async fn build_state(config: AppConfig) -> AppState {
    let ctx = AwsContext::load(&config.aws).await;
    let timeout = Duration::from_secs(config.server.credential_probe_timeout_secs);

    let probe = StsIdentity::new(&ctx);
    let identity = match tokio::time::timeout(timeout, probe.caller_identity()).await {
        Ok(result) => result,
        Err(_) => Err(KbError::Timeout(format!(
            "STS GetCallerIdentity after {}s",
            timeout.as_secs()
        ))),
    };
    let status = credential_status(&identity);

    match identity {
        Ok(identity) => {
            tracing::info!(account = %identity.account, arn = %identity.arn, "AWS credentials configured");
            let engine = ChatEngine::new(
                Arc::new(BedrockLlm::new(&ctx)),
                Arc::new(BedrockRetriever::new(&ctx)),
                config.chat.clone(),
                deployment(&config),
            );
            AppState::new(config, engine, status)
        }
        Err(e) => {
            tracing::warn!(error = %e, "AWS unavailable, running in demo mode");
            AppState::offline(config, status)
        }
    }
}

/// Wait for Ctrl+C, then report not-ready while in-flight requests drain
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    state.set_ready(false);
    tracing::info!("shutdown signal received, readiness cleared");
}
