//! Ingestion job commands
//!
//! Author: hephaex@gmail.com

use crate::commands::aws;
use crate::output::{divider, time_or_na};
use clap::Subcommand;
use kbops_aws::KnowledgeBaseAdmin;
use kbops_core::{AppConfig, IngestionJob, IngestionStatus};

#[derive(Subcommand)]
pub enum IngestCommand {
    /// Show data sources and their ingestion jobs
    Status { kb_id: String },
    /// Start an ingestion job
    Start {
        kb_id: String,
        /// Data source ID; defaults to the first data source
        #[arg(long)]
        data_source: Option<String>,
        /// Poll until the job completes
        #[arg(long)]
        wait: bool,
    },
}

pub async fn run(config: &AppConfig, command: IngestCommand) -> anyhow::Result<()> {
    let ctx = aws(config).await;
    let admin = KnowledgeBaseAdmin::new(&ctx);

    match command {
        IngestCommand::Status { kb_id } => status(&admin, &kb_id).await,
        IngestCommand::Start {
            kb_id,
            data_source,
            wait,
        } => {
            let data_source_id = match data_source {
                Some(id) => id,
                None => first_data_source(&admin, &kb_id).await?,
            };
            if wait {
                start_and_wait(config, &admin, &kb_id, &data_source_id).await?;
            } else {
                let job = admin
                    .start_ingestion_job(&kb_id, &data_source_id, Some("Manual ingestion"))
                    .await?;
                println!("✅ Ingestion job started: {}", job.id);
                println!("   Status: {}", job.status);
                println!("💡 Check progress with `kbops ingest status {kb_id}`");
            }
            Ok(())
        }
    }
}

async fn first_data_source(admin: &KnowledgeBaseAdmin, kb_id: &str) -> anyhow::Result<String> {
    admin
        .list_data_sources(kb_id)
        .await?
        .into_iter()
        .next()
        .map(|ds| ds.id)
        .ok_or_else(|| anyhow::anyhow!("knowledge base {kb_id} has no data sources"))
}

async fn status(admin: &KnowledgeBaseAdmin, kb_id: &str) -> anyhow::Result<()> {
    let sources = admin.list_data_sources(kb_id).await?;
    println!("📁 Found {} data sources:", sources.len());

    for ds in &sources {
        println!("\nData Source: {} ({})", ds.name, ds.id);
        println!("   Status: {}", ds.status);

        let jobs = admin.list_ingestion_jobs(kb_id, &ds.id).await?;
        if jobs.is_empty() {
            println!("   ⚠️ No ingestion jobs found. Start one with `kbops ingest start {kb_id}`");
            continue;
        }

        println!("   Ingestion Jobs: {}", jobs.len());
        for job in &jobs {
            divider();
            print_job(job);
            if job.status == IngestionStatus::Failed {
                // Summaries omit the reasons; fetch the job for them
                match admin.get_ingestion_job(kb_id, &ds.id, &job.id).await {
                    Ok(detail) => {
                        for reason in &detail.failure_reasons {
                            println!("     ❌ {reason}");
                        }
                    }
                    Err(e) => println!("     ⚠️ Could not fetch failure reasons: {e}"),
                }
            }
        }
    }
    Ok(())
}

fn print_job(job: &IngestionJob) {
    println!("   Job ID: {}", job.id);
    println!("     Status: {}", job.status);
    println!("     Started: {}", time_or_na(job.started_at));
    println!("     Updated: {}", time_or_na(job.updated_at));
}

/// Start ingestion and poll it to a terminal state. A failed or stopped
/// job is reported but not treated as an error.
pub async fn start_and_wait(
    config: &AppConfig,
    admin: &KnowledgeBaseAdmin,
    kb_id: &str,
    data_source_id: &str,
) -> anyhow::Result<IngestionJob> {
    println!("🔄 Starting ingestion job...");
    let job = admin
        .start_ingestion_job(kb_id, data_source_id, Some("Initial ingestion"))
        .await?;
    println!("✅ Ingestion job started: {}", job.id);

    println!(
        "⏳ Waiting for ingestion (every {}s, at most {} checks)...",
        config.polling.interval_secs, config.polling.max_attempts
    );
    let job = admin
        .wait_for_ingestion(kb_id, data_source_id, &job.id, &config.polling)
        .await?;

    match job.status {
        IngestionStatus::Complete => println!("✅ Ingestion completed successfully"),
        ref other => {
            println!("❌ Ingestion finished with status {other}");
            for reason in &job.failure_reasons {
                println!("   {reason}");
            }
        }
    }
    Ok(job)
}
