//! Knowledge base commands
//!
//! Listing, inspection, end-to-end creation and retrieval diagnostics.
//!
//! Author: hephaex@gmail.com

use crate::commands::{aws, collection, ingest, required};
use crate::output::{banner, divider, or_na, preview, section, time_or_na};
use clap::Subcommand;
use kbops_aws::{
    AuroraAdmin, AwsContext, BedrockRetriever, CreateKnowledgeBase, KnowledgeBaseAdmin, RoleAdmin,
    VectorStorage,
};
use kbops_aws::roles::knowledge_base_access_policy;
use kbops_core::{
    foundation_model_arn, AppConfig, IdentityProbe, KnowledgeBaseRetriever, ResourceRecord,
    StorageBackend,
};
use std::time::Duration;

/// Queries used by `kb test`, one per equipment family
pub const DIAGNOSTIC_QUERIES: [&str; 6] = [
    "BD850 bulldozer engine specifications",
    "bulldozer operating weight",
    "DT1000 dump truck payload capacity",
    "X950 excavator digging depth",
    "FL250 forklift lifting capacity",
    "MC750 crane maximum capacity",
];

/// Questions used by `kb test --generate`
pub const GENERATION_QUERIES: [&str; 2] = [
    "What are the engine specifications of the BD850 bulldozer?",
    "What is the operating weight of the X950 excavator?",
];

#[derive(Subcommand)]
pub enum KbCommand {
    /// List knowledge bases in the region
    List,
    /// Show a knowledge base and its data sources
    Status {
        /// Knowledge base ID
        kb_id: String,
    },
    /// Create the service role, vector store, knowledge base and data source
    Create {
        /// Vector store backend (opensearch or aurora)
        #[arg(long)]
        storage: Option<StorageBackend>,
        /// Do not start ingestion after creating the data source
        #[arg(long)]
        no_ingest: bool,
    },
    /// Run the retrieval diagnostic against a knowledge base
    Test {
        kb_id: String,
        /// Also run retrieve-and-generate
        #[arg(long)]
        generate: bool,
    },
    /// Retrieve passages for one query
    Query {
        kb_id: String,
        text: String,
        /// Answer with retrieve-and-generate instead of listing passages
        #[arg(long)]
        generate: bool,
    },
}

pub async fn run(config: &AppConfig, command: KbCommand) -> anyhow::Result<()> {
    let ctx = aws(config).await;
    match command {
        KbCommand::List => list(config, &ctx).await,
        KbCommand::Status { kb_id } => status(&ctx, &kb_id).await,
        KbCommand::Create { storage, no_ingest } => {
            let storage = storage.unwrap_or(config.knowledge_base.storage);
            create(config, &ctx, storage, !no_ingest).await
        }
        KbCommand::Test { kb_id, generate } => test(config, &ctx, &kb_id, generate).await,
        KbCommand::Query {
            kb_id,
            text,
            generate,
        } => {
            if generate {
                generate_answer(config, &ctx, &kb_id, &text).await
            } else {
                let hits = retrieve(config, &ctx, &kb_id, &text).await?;
                if hits == 0 {
                    println!("⚠️ No passages found. Has ingestion completed?");
                }
                Ok(())
            }
        }
    }
}

async fn list(config: &AppConfig, ctx: &AwsContext) -> anyhow::Result<()> {
    let kbs = KnowledgeBaseAdmin::new(ctx).list_knowledge_bases().await?;

    println!("📚 Found {} Knowledge Bases in {}:", kbs.len(), ctx.region());
    println!("{}", "=".repeat(60));

    if kbs.is_empty() {
        println!("❌ No Knowledge Bases found in your account.");
        println!("\n💡 To create one, run `kbops kb create` or follow `kbops guide kb`.");
        println!(
            "   Source documents: s3://{}/{}",
            config.knowledge_base.s3_bucket, config.knowledge_base.s3_prefix
        );
        return Ok(());
    }

    for (i, kb) in kbs.iter().enumerate() {
        println!("{}. Knowledge Base ID: {}", i + 1, kb.id);
        println!("   Name: {}", kb.name);
        println!("   Description: {}", or_na(kb.description.as_deref()));
        println!("   Status: {}", kb.status);
        println!("   Updated: {}", time_or_na(kb.updated_at));
        divider();
    }
    Ok(())
}

async fn status(ctx: &AwsContext, kb_id: &str) -> anyhow::Result<()> {
    let admin = KnowledgeBaseAdmin::new(ctx);
    let kb = admin.get_knowledge_base(kb_id).await?;

    println!("✅ Knowledge Base Status: {}", kb.status);
    println!("   Name: {}", kb.name);
    println!("   ARN: {}", kb.arn);
    println!("   Description: {}", or_na(kb.description.as_deref()));
    println!("   Created: {}", time_or_na(kb.created_at));
    println!("   Updated: {}", time_or_na(kb.updated_at));
    for reason in &kb.failure_reasons {
        println!("   ❌ Failure: {reason}");
    }

    let sources = admin.list_data_sources(kb_id).await?;
    println!("   Data Sources: {}", sources.len());
    for ds in &sources {
        println!("     - {} ({}): {}", ds.name, ds.id, ds.status);
        println!("       Description: {}", or_na(ds.description.as_deref()));
    }
    Ok(())
}

// ============================================================================
// Create
// ============================================================================

async fn create(
    config: &AppConfig,
    ctx: &AwsContext,
    storage: StorageBackend,
    start_ingestion: bool,
) -> anyhow::Result<()> {
    let kb_config = &config.knowledge_base;
    banner("🚀 Creating Bedrock Knowledge Base");

    let identity = kbops_aws::StsIdentity::new(ctx).caller_identity().await?;
    println!("✅ AWS Account: {}", identity.account);

    // Service role
    section("🔐 IAM role");
    let roles = RoleAdmin::new(ctx);
    let role_name = kb_config.role_name();
    let (role_arn, role_state) = roles
        .ensure_role(&role_name, "Service role for Bedrock Knowledge Base")
        .await?;
    roles
        .put_inline_policy(
            &role_name,
            "KnowledgeBaseAccess",
            &knowledge_base_access_policy(ctx.region(), &kb_config.s3_bucket),
        )
        .await?;
    println!("✅ Role {role_arn} ({role_state:?})");
    if role_state == kbops_aws::Provisioned::Created {
        let wait = config.polling.role_propagation_secs;
        println!("⏳ Waiting {wait}s for the role to propagate...");
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }

    // Vector store
    let (vector_storage, collection_id) = match storage {
        StorageBackend::OpenSearch => {
            let principals = vec![role_arn.clone(), identity.arn.clone()];
            let info = collection::provision(config, ctx, &principals).await?;
            let storage = VectorStorage::OpenSearch {
                collection_arn: info.arn.clone(),
                vector_index: kb_config.vector_index.clone(),
                vector_field: kb_config.vector_field.clone(),
                text_field: kb_config.text_field.clone(),
                metadata_field: kb_config.metadata_field.clone(),
            };
            (storage, Some(info.id))
        }
        StorageBackend::Aurora => {
            section("🗄️ Aurora PostgreSQL storage");
            let aurora = &config.aurora;
            let secret_arn = required(aurora.secret_arn.as_deref(), "AURORA_SECRET_ARN")?;
            let cluster_arn = match &aurora.cluster_arn {
                Some(arn) => arn.clone(),
                None => {
                    AuroraAdmin::new(ctx)
                        .describe_cluster(&aurora.cluster_identifier)
                        .await?
                        .arn
                }
            };
            println!("✅ Cluster {cluster_arn}");
            println!("💡 The table must exist first: run `kbops db setup`");
            let storage = VectorStorage::Aurora {
                cluster_arn,
                secret_arn: secret_arn.to_string(),
                database: aurora.database.clone(),
                table: aurora.qualified_table(),
            };
            (storage, None)
        }
    };

    // Knowledge base and data source
    section("📚 Knowledge base");
    let admin = KnowledgeBaseAdmin::new(ctx);
    let kb = admin
        .create_knowledge_base(&CreateKnowledgeBase {
            name: kb_config.name.clone(),
            description: kb_config.description.clone(),
            role_arn,
            embedding_model_arn: config.embedding_model_arn(),
            storage: vector_storage,
        })
        .await?;
    println!("✅ Knowledge Base created with ID: {}", kb.id);

    println!("📁 Creating data source...");
    let data_source_id = admin
        .create_s3_data_source(
            &kb.id,
            &kb_config.data_source_name(),
            &kb_config.bucket_arn(),
            &kb_config.s3_prefix,
        )
        .await?;
    println!("✅ Data source created with ID: {data_source_id}");

    let ingestion_job_id = if start_ingestion {
        let job = ingest::start_and_wait(config, &admin, &kb.id, &data_source_id).await?;
        Some(job.id)
    } else {
        println!("💡 Start ingestion later with `kbops ingest start {}`", kb.id);
        None
    };

    let record = ResourceRecord {
        knowledge_base_id: kb.id.clone(),
        data_source_id,
        ingestion_job_id,
        collection_id,
        created_at: chrono::Utc::now(),
        account_id: identity.account,
        region: ctx.region().to_string(),
    };
    record.save(&kb_config.record_path)?;

    println!();
    println!("🎉 Knowledge Base setup complete!");
    println!("   Knowledge Base ID: {}", kb.id);
    println!("   Saved to: {}", kb_config.record_path.display());
    println!("   Use it in the chat UI or set KB_ID={}", kb.id);
    Ok(())
}

// ============================================================================
// Retrieval diagnostics
// ============================================================================

async fn test(config: &AppConfig, ctx: &AwsContext, kb_id: &str, generate: bool) -> anyhow::Result<()> {
    banner("🧠 Knowledge Base Diagnostic Test");

    section("1. Knowledge Base status");
    status(ctx, kb_id).await?;

    section("2. Document retrieval");
    let mut successes = 0;
    for query in DIAGNOSTIC_QUERIES {
        println!("\n   Testing query: '{query}'");
        match retrieve(config, ctx, kb_id, query).await {
            Ok(hits) if hits > 0 => successes += 1,
            Ok(_) => {}
            Err(e) => println!("❌ Retrieval error: {e}"),
        }
    }
    println!(
        "\n   Retrieval Success Rate: {successes}/{}",
        DIAGNOSTIC_QUERIES.len()
    );

    if generate {
        section("3. Knowledge Base generation");
        for query in GENERATION_QUERIES {
            println!("\n   Testing generation: '{query}'");
            if let Err(e) = generate_answer(config, ctx, kb_id, query).await {
                println!("❌ Generation error: {e}");
            }
        }
    }

    println!("\n{}", "=".repeat(50));
    println!("Diagnostic complete!");
    Ok(())
}

/// Print the passages for `query`; returns how many were found
async fn retrieve(config: &AppConfig, ctx: &AwsContext, kb_id: &str, query: &str) -> anyhow::Result<usize> {
    let passages = BedrockRetriever::new(ctx)
        .retrieve(kb_id, query, config.chat.number_of_results)
        .await?;

    println!("✅ Retrieved {} results for: '{query}'", passages.len());
    for (i, passage) in passages.iter().enumerate() {
        println!("   Result {}:", i + 1);
        if let Some(score) = passage.score {
            println!("     Score: {score:.3}");
        }
        println!("     Content: {}", preview(&passage.text, 150));
        if let Some(uri) = &passage.source_uri {
            println!("     Source: {uri}");
        }
    }
    Ok(passages.len())
}

async fn generate_answer(config: &AppConfig, ctx: &AwsContext, kb_id: &str, query: &str) -> anyhow::Result<()> {
    let model_arn = foundation_model_arn(ctx.region(), &config.chat.default_model);
    let answer = BedrockRetriever::new(ctx)
        .retrieve_and_generate(kb_id, &model_arn, query)
        .await?;

    println!("✅ Generated response for: '{query}'");
    println!("   Response: {}", preview(&answer.text, 200));
    if !answer.citations.is_empty() {
        println!("   Citations: {}", answer.citations.len());
        for (i, uri) in answer.citations.iter().enumerate() {
            println!("     Citation {}: {uri}", i + 1);
        }
    }
    Ok(())
}
