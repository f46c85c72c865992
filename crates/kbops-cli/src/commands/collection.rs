//! Serverless vector collection commands
//!
//! Author: hephaex@gmail.com

use crate::commands::aws;
use crate::output::{divider, or_na, section};
use clap::Subcommand;
use kbops_aws::index::index_mapping;
use kbops_aws::{AwsContext, CollectionAdmin, Provisioned, RoleAdmin, StsIdentity, VectorIndexClient};
use kbops_core::{AppConfig, CollectionInfo, IdentityProbe};
use std::time::Duration;

#[derive(Subcommand)]
pub enum CollectionCommand {
    /// Create security policies, the collection and its vector index
    Setup,
    /// List collections, or show one by name
    Status {
        /// Collection name; defaults to every collection
        name: Option<String>,
    },
    /// Create the vector index on an existing collection
    Index,
}

pub async fn run(config: &AppConfig, command: CollectionCommand) -> anyhow::Result<()> {
    let ctx = aws(config).await;
    match command {
        CollectionCommand::Setup => {
            let principals = principals(config, &ctx).await?;
            let info = provision(config, &ctx, &principals).await?;
            println!("\n🎉 Collection ready");
            println!("   Collection ARN: {}", info.arn);
            println!("   Endpoint: {}", or_na(info.endpoint.as_deref()));
            Ok(())
        }
        CollectionCommand::Status { name } => status(config, &ctx, name.as_deref()).await,
        CollectionCommand::Index => {
            let admin = CollectionAdmin::new(&ctx, config.collection.clone());
            let info = admin
                .find_by_name(&config.collection.name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("collection {} not found", config.collection.name))?;
            create_index(config, &ctx, &info).await
        }
    }
}

/// Caller ARN plus the knowledge base service role, when it exists
async fn principals(config: &AppConfig, ctx: &AwsContext) -> anyhow::Result<Vec<String>> {
    let identity = StsIdentity::new(ctx).caller_identity().await?;
    let mut principals = vec![identity.arn];

    match RoleAdmin::new(ctx)
        .get_role_arn(&config.knowledge_base.role_name())
        .await?
    {
        Some(role_arn) => principals.push(role_arn),
        None => println!(
            "⚠️ Role {} not found; only the caller is granted access",
            config.knowledge_base.role_name()
        ),
    }
    Ok(principals)
}

/// Policies, collection, index. Every step tolerates an existing resource.
pub async fn provision(
    config: &AppConfig,
    ctx: &AwsContext,
    principals: &[String],
) -> anyhow::Result<CollectionInfo> {
    let admin = CollectionAdmin::new(ctx, config.collection.clone());

    section("🔐 Security policies");
    report("Encryption policy", admin.create_encryption_policy().await?);
    report("Network policy", admin.create_network_policy().await?);
    report(
        "Data access policy",
        admin.create_data_access_policy(principals).await?,
    );

    section("🗂️ Vector collection");
    let (info, state) = admin.create_collection().await?;
    report(&format!("Collection {}", admin.collection_name()), state);

    println!("⏳ Waiting for collection {} to become ACTIVE...", info.id);
    let info = admin.wait_until_active(&info.id, &config.polling).await?;
    println!("✅ Collection is ACTIVE");

    create_index(config, ctx, &info).await?;
    Ok(info)
}

async fn create_index(config: &AppConfig, ctx: &AwsContext, info: &CollectionInfo) -> anyhow::Result<()> {
    let endpoint = info
        .endpoint
        .as_deref()
        .or(config.collection.endpoint.as_deref())
        .ok_or_else(|| anyhow::anyhow!("collection {} has no endpoint yet", info.name))?;

    let kb = &config.knowledge_base;
    section("📐 Vector index");
    let mapping = index_mapping(
        &kb.vector_field,
        &kb.text_field,
        &kb.metadata_field,
        u32::try_from(config.collection.dimension)?,
    );
    let state = VectorIndexClient::new(ctx)
        .create_index(endpoint, &kb.vector_index, &mapping)
        .await?;
    report(&format!("Index {}", kb.vector_index), state);

    if state == Provisioned::Created {
        let wait = config.polling.policy_propagation_secs;
        println!("⏳ Waiting {wait}s for the index to become visible...");
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }
    Ok(())
}

fn report(what: &str, state: Provisioned) {
    match state {
        Provisioned::Created => println!("✅ {what} created"),
        Provisioned::AlreadyExists => println!("ℹ️ {what} already exists"),
    }
}

async fn status(config: &AppConfig, ctx: &AwsContext, name: Option<&str>) -> anyhow::Result<()> {
    let admin = CollectionAdmin::new(ctx, config.collection.clone());

    let collections = match name {
        Some(name) => admin.find_by_name(name).await?.into_iter().collect(),
        None => admin.list_collections().await?,
    };

    if collections.is_empty() {
        println!("❌ No collections found");
        println!("💡 Create one with `kbops collection setup`");
        return Ok(());
    }

    println!("🗂️ Found {} collections:", collections.len());
    for info in &collections {
        divider();
        println!("Name: {}", info.name);
        println!("   ID: {}", info.id);
        println!("   ARN: {}", info.arn);
        println!("   Status: {}", info.status);
        println!("   Endpoint: {}", or_na(info.endpoint.as_deref()));
    }
    Ok(())
}
