//! Manual setup walkthroughs
//!
//! Author: hephaex@gmail.com

use clap::Subcommand;
use kbops_core::AppConfig;
use kbops_vector::VectorSchema;
use std::fmt::Write;

#[derive(Subcommand)]
pub enum GuideCommand {
    /// Create a knowledge base in the console
    Kb,
    /// Connect to Aurora and prepare the vector table by hand
    Db,
}

pub fn run(config: &AppConfig, command: GuideCommand) -> anyhow::Result<()> {
    let text = match command {
        GuideCommand::Kb => kb_guide(config),
        GuideCommand::Db => db_guide(config)?,
    };
    print!("{text}");
    Ok(())
}

fn rule(out: &mut String) {
    out.push_str(&"=".repeat(50));
    out.push('\n');
}

pub fn kb_guide(config: &AppConfig) -> String {
    let kb = &config.knowledge_base;
    let mut out = String::new();

    out.push_str("🤖 Creating a Knowledge Base in the console\n");
    rule(&mut out);
    out.push_str("1. Open https://console.aws.amazon.com/bedrock\n");
    out.push_str("2. Choose 'Knowledge bases' in the left menu\n");
    out.push_str("3. Click 'Create knowledge base'\n");
    out.push_str("4. Follow the wizard:\n");
    let _ = writeln!(out, "   - Name: '{}'", kb.name);
    out.push_str("   - Data source: Amazon S3\n");
    let _ = writeln!(out, "   - S3 URI: s3://{}/{}", kb.s3_bucket, kb.s3_prefix);
    let _ = writeln!(out, "   - Embeddings model: {}", kb.embedding_model);
    out.push_str("   - Vector database: Amazon OpenSearch Serverless (new collection)\n");
    out.push_str("5. Wait for indexing to complete (5-10 minutes)\n");
    out.push_str("6. Copy the Knowledge Base ID and set KB_ID, or paste it into the chat UI\n");

    out.push_str("\n📋 Region and bucket\n");
    let _ = writeln!(out, "   Region: {}", config.aws.region);
    let _ = writeln!(out, "   Bucket: {}", kb.s3_bucket);
    let _ = writeln!(out, "   Documents: {}", kb.s3_prefix);

    out.push_str("\n💡 Or let kbops do it: `kbops kb create`\n");
    out
}

pub fn db_guide(config: &AppConfig) -> anyhow::Result<String> {
    let aurora = &config.aurora;
    let schema = VectorSchema::from(aurora);
    schema.validate()?;

    let mut out = String::new();
    out.push_str("🔧 Aurora PostgreSQL connection\n");
    rule(&mut out);
    let _ = writeln!(out, "Cluster: {}", aurora.cluster_identifier);
    let _ = writeln!(
        out,
        "Host: {}",
        aurora.host.as_deref().unwrap_or("see `kbops db info`")
    );
    let _ = writeln!(out, "Port: {}", aurora.port);
    let _ = writeln!(out, "Database: {}", aurora.database);
    out.push_str("Credentials: `kbops db credentials`\n");

    out.push_str("\n🎯 Method 1: RDS Query Editor\n");
    rule(&mut out);
    out.push_str("1. Open the RDS console\n");
    let _ = writeln!(out, "2. Select the cluster {}", aurora.cluster_identifier);
    out.push_str("3. Open 'Query Editor'\n");
    out.push_str("4. Choose 'Connect using database credentials' or the Secrets Manager ARN\n");
    let _ = writeln!(out, "5. Database name: {}", aurora.database);

    out.push_str("\n🎯 Method 2: psql\n");
    rule(&mut out);
    out.push_str("1. Enable public access: `kbops db public enable`\n");
    out.push_str("2. Allow inbound 5432 from your IP in the cluster security group\n");
    let _ = writeln!(
        out,
        "3. psql -h <cluster-endpoint> -p {} -U <username> -d {}",
        aurora.port, aurora.database
    );
    out.push_str("4. Disable public access afterwards: `kbops db public disable`\n");

    out.push_str("\n🛠️ Setup statements\n");
    rule(&mut out);
    for statement in schema.setup_statements() {
        let _ = writeln!(out, "-- {}\n{}\n", statement.description, statement.sql);
    }

    out.push_str("📊 Verification queries\n");
    rule(&mut out);
    for query in schema.verification_queries() {
        let _ = writeln!(out, "-- {}\n{}\n", query.name, query.sql);
    }
    Ok(out)
}
