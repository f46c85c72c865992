//! Credential, Bedrock and S3 checks

use crate::commands::aws;
use crate::output::{banner, section};
use kbops_aws::{DocumentBucket, FoundationModels, StsIdentity};
use kbops_chat::credential_status;
use kbops_core::{AppConfig, IdentityProbe};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    banner("🔍 Checking AWS setup");
    let ctx = aws(config).await;
    let mut failures = 0;

    section("1. Credentials");
    let identity = StsIdentity::new(&ctx).caller_identity().await;
    println!("{}", credential_status(&identity));
    let identity = identity?;
    println!("   Account: {}", identity.account);
    println!("   ARN: {}", identity.arn);
    println!("   Region: {}", ctx.region());

    section("2. Bedrock access");
    match FoundationModels::new(&ctx).list_ids().await {
        Ok(ids) => {
            println!("✅ Bedrock access confirmed: {} foundation models", ids.len());
            for model in &config.chat.models {
                let found = ids.iter().any(|id| id == model);
                println!(
                    "   {} {model}",
                    if found { "✅" } else { "⚠️ not listed:" }
                );
            }
        }
        Err(e) => {
            failures += 1;
            println!("❌ Bedrock access error: {e}");
        }
    }

    section("3. Source documents");
    let bucket = DocumentBucket::new(
        &ctx,
        &config.knowledge_base.s3_bucket,
        &config.knowledge_base.s3_prefix,
    );
    match bucket.list_pdfs().await {
        Ok(keys) if keys.is_empty() => {
            println!("⚠️ No PDF documents under {}", bucket.location());
        }
        Ok(keys) => {
            println!("✅ Found {} PDF documents in {}", keys.len(), bucket.location());
            for key in &keys {
                println!("   - {key}");
            }
        }
        Err(e) => {
            failures += 1;
            println!("❌ S3 access error: {e}");
        }
    }

    println!();
    if failures > 0 {
        anyhow::bail!("{failures} check(s) failed");
    }
    println!("🎉 All checks passed");
    Ok(())
}
