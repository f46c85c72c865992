//! Aurora PostgreSQL commands
//!
//! Statements run through the RDS Data API by default. `--direct` connects
//! with sqlx using the secret's credentials instead, which needs network
//! access to the cluster.
//!
//! Author: hephaex@gmail.com

use crate::commands::{aws, required};
use crate::output::{banner, mark, or_na, render_table, section};
use clap::{Subcommand, ValueEnum};
use kbops_aws::{AuroraAdmin, AwsContext, DataApiExecutor, Ec2Network};
use kbops_core::{
    analyze_vpcs, AppConfig, DatabaseCredentials, Reachability, SqlExecutor, VpcAnalysis,
    ROLE_PASSWORD_ENV,
};
use kbops_vector::{run_setup, run_verification, PgExecutor, StepOutcome, VectorSchema};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Show connection parameters from the cluster secret
    Credentials,
    /// Write the annotated setup script
    Script {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create the pgvector extension, schema, role, table and indexes
    Setup {
        #[arg(long)]
        direct: bool,
    },
    /// Check that the knowledge base table is ready
    Verify {
        #[arg(long)]
        direct: bool,
    },
    /// Run one SQL statement and print the result
    Exec {
        sql: String,
        #[arg(long)]
        direct: bool,
    },
    /// Inspect or change public accessibility of the cluster instances
    Public {
        #[arg(value_enum)]
        action: PublicAction,
    },
    /// Describe the cluster and how it can be reached
    Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PublicAction {
    Enable,
    Disable,
    Status,
}

pub async fn run(config: &AppConfig, command: DbCommand) -> anyhow::Result<()> {
    match command {
        DbCommand::Script { out } => script(config, out),
        DbCommand::Credentials => {
            let ctx = aws(config).await;
            let creds = credentials(config, &ctx).await?;
            print_credentials(&creds);
            Ok(())
        }
        DbCommand::Setup { direct } => {
            let ctx = aws(config).await;
            let executor = executor(config, &ctx, direct).await?;
            setup(config, executor.as_ref()).await
        }
        DbCommand::Verify { direct } => {
            let ctx = aws(config).await;
            let executor = executor(config, &ctx, direct).await?;
            verify(config, executor.as_ref()).await
        }
        DbCommand::Exec { sql, direct } => {
            let ctx = aws(config).await;
            let executor = executor(config, &ctx, direct).await?;
            let outcome = executor.execute(&sql).await?;
            if outcome.columns.is_empty() {
                match outcome.rows_affected {
                    Some(n) => println!("✅ OK ({n} rows affected)"),
                    None => println!("✅ OK"),
                }
            } else {
                println!("{}", render_table(&outcome.columns, &outcome.rows));
                println!("({} rows)", outcome.rows.len());
            }
            Ok(())
        }
        DbCommand::Public { action } => {
            let ctx = aws(config).await;
            public(config, &ctx, action).await
        }
        DbCommand::Info => {
            let ctx = aws(config).await;
            info(config, &ctx).await
        }
    }
}

// ============================================================================
// Connections
// ============================================================================

async fn credentials(config: &AppConfig, ctx: &AwsContext) -> anyhow::Result<DatabaseCredentials> {
    let aurora = &config.aurora;
    let secret_arn = required(aurora.secret_arn.as_deref(), "AURORA_SECRET_ARN")?;
    let creds = AuroraAdmin::new(ctx).credentials(secret_arn).await?;

    // Secrets created by hand often carry no host
    let host = match (&creds.host, &aurora.host) {
        (Some(_), _) => None,
        (None, Some(host)) => Some(host.clone()),
        (None, None) => AuroraAdmin::new(ctx)
            .describe_cluster(&aurora.cluster_identifier)
            .await
            .ok()
            .and_then(|c| c.endpoint),
    };
    Ok(creds.with_default_host(host))
}

fn print_credentials(creds: &DatabaseCredentials) {
    banner("🔑 Database credentials");
    println!("   Host: {}", or_na(creds.host.as_deref()));
    println!("   Port: {}", creds.port);
    println!("   Database: {}", creds.database);
    println!("   Username: {}", creds.username);
    println!("   Password: {}", mask(creds.password.as_deref()));
    println!("\n💡 Connect manually with:\n   {}", creds.psql_command());
}

/// Never print the secret itself
fn mask(password: Option<&str>) -> String {
    match password {
        Some(p) if !p.is_empty() => "*".repeat(p.chars().count().min(12)),
        _ => "N/A".to_string(),
    }
}

async fn executor(
    config: &AppConfig,
    ctx: &AwsContext,
    direct: bool,
) -> anyhow::Result<Box<dyn SqlExecutor>> {
    let aurora = &config.aurora;
    if direct {
        let creds = credentials(config, ctx).await?;
        let pg = PgExecutor::connect_with(&creds).await?;
        return Ok(Box::new(pg));
    }

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
    Ok(Box::new(DataApiExecutor::new(
        ctx,
        cluster_arn,
        secret_arn,
        aurora.database.clone(),
    )))
}

// ============================================================================
// Setup and verification
// ============================================================================

fn script(config: &AppConfig, out: Option<PathBuf>) -> anyhow::Result<()> {
    let schema = VectorSchema::from(&config.aurora);
    schema.validate()?;
    let script = schema.render_script();

    match out {
        Some(path) => {
            std::fs::write(&path, script)?;
            println!("✅ Setup script written to {}", path.display());
            println!("💡 Run it with psql, the RDS Query Editor or CloudShell");
        }
        None => print!("{script}"),
    }
    Ok(())
}

fn print_step(step: &StepOutcome) {
    match &step.result {
        Ok(outcome) => {
            println!("{} {}", mark(true), step.description);
            if !outcome.columns.is_empty() && !outcome.rows.is_empty() {
                for line in render_table(&outcome.columns, &outcome.rows).lines() {
                    println!("     {line}");
                }
            }
        }
        Err(e) => println!("{} {}: {e}", mark(false), step.description),
    }
}

async fn setup(config: &AppConfig, executor: &dyn SqlExecutor) -> anyhow::Result<()> {
    let schema = VectorSchema::from(&config.aurora);
    schema.validate()?;

    banner(&format!("🚀 Setting up {} via {}", schema.qualified_table(), executor.name()));
    let report = run_setup(executor, &schema.setup_statements()).await;
    for step in &report.steps {
        print_step(step);
    }

    println!(
        "\n📊 {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    if !report.all_ok() {
        anyhow::bail!("{} setup statements failed", report.failed());
    }

    if schema.role_password.is_none() {
        println!("{}", role_password_hint(&schema.role));
    }
    println!("🎉 Vector storage ready. Next: `kbops kb create --storage aurora`");
    Ok(())
}

fn role_password_hint(role: &str) -> String {
    format!(
        "⚠️ No password was set for {role}. Set {ROLE_PASSWORD_ENV} and re-run, or ALTER ROLE manually."
    )
}

async fn verify(config: &AppConfig, executor: &dyn SqlExecutor) -> anyhow::Result<()> {
    let schema = VectorSchema::from(&config.aurora);
    schema.validate()?;

    banner(&format!("🔍 Verifying {} via {}", schema.qualified_table(), executor.name()));
    let report = run_verification(executor, &schema).await;
    for step in &report.steps {
        print_step(step);
    }

    section("📋 Summary");
    println!("{} pgvector extension installed", mark(report.vector_extension));
    println!("{} table {} present", mark(report.table_present), schema.qualified_table());
    match report.row_count {
        Some(n) => println!("   Rows: {n}"),
        None => println!("   Rows: N/A"),
    }

    if !(report.vector_extension && report.table_present) {
        anyhow::bail!("vector storage is not ready; run `kbops db setup`");
    }
    println!("✅ Ready for Bedrock Knowledge Base");
    Ok(())
}

// ============================================================================
// Cluster
// ============================================================================

async fn public(config: &AppConfig, ctx: &AwsContext, action: PublicAction) -> anyhow::Result<()> {
    let admin = AuroraAdmin::new(ctx);
    let cluster = &config.aurora.cluster_identifier;

    match action {
        PublicAction::Status => {
            let instances = admin.public_access(cluster).await?;
            println!("🌐 Public access for {cluster}:");
            for instance in &instances {
                println!(
                    "   {} {} ({}): publicly accessible = {}",
                    mark(instance.publicly_accessible),
                    instance.identifier,
                    instance.status,
                    instance.publicly_accessible
                );
            }
        }
        PublicAction::Enable | PublicAction::Disable => {
            let enable = action == PublicAction::Enable;
            let modified = admin.set_public_access(cluster, enable).await?;
            let verb = if enable { "Enabling" } else { "Disabling" };
            for instance in &modified {
                println!("✅ {verb} public access on {instance}");
            }
            println!("⏳ Changes apply within a few minutes. Check with `kbops db public status`");
            if enable {
                println!("⚠️ The security group must also allow inbound 5432 from your IP");
            }
        }
    }
    Ok(())
}

async fn info(config: &AppConfig, ctx: &AwsContext) -> anyhow::Result<()> {
    let admin = AuroraAdmin::new(ctx);
    let cluster = admin.describe_cluster(&config.aurora.cluster_identifier).await?;

    banner(&format!("🗄️ Cluster {}", cluster.identifier));
    println!("   ARN: {}", cluster.arn);
    println!("   Status: {}", cluster.status);
    println!(
        "   Engine: {} {}",
        cluster.engine,
        or_na(cluster.engine_version.as_deref())
    );
    println!("   Writer endpoint: {}", or_na(cluster.endpoint.as_deref()));
    println!("   Reader endpoint: {}", or_na(cluster.reader_endpoint.as_deref()));
    match cluster.port {
        Some(port) => println!("   Port: {port}"),
        None => println!("   Port: N/A"),
    }
    println!(
        "   {} Data API (HTTP endpoint) enabled",
        mark(cluster.http_endpoint_enabled)
    );
    println!("   Security groups: {}", cluster.security_groups.join(", "));
    println!("   Instances: {}", cluster.members.join(", "));

    if !cluster.http_endpoint_enabled {
        println!("💡 Enable the Data API, or use --direct with public access");
    }

    // Network analysis is advisory; the cluster description above stands alone
    let vpc_id = match &cluster.subnet_group {
        Some(group) => admin.subnet_group_vpc(group).await.unwrap_or_else(|e| {
            tracing::warn!(subnet_group = %group, error = %e, "subnet group lookup failed");
            None
        }),
        None => None,
    };
    let analysis = match analyze_vpcs(&Ec2Network::new(ctx), vpc_id.as_deref()).await {
        Ok(analysis) => analysis,
        Err(e) => {
            println!("⚠️ VPC analysis unavailable: {e}");
            return Ok(());
        }
    };
    print_network(&analysis);

    let publicly_accessible = match admin.public_access(&cluster.identifier).await {
        Ok(instances) => instances.iter().any(|i| i.publicly_accessible),
        Err(e) => {
            tracing::warn!(error = %e, "public access lookup failed");
            false
        }
    };
    let reachability = Reachability::classify(&analysis, publicly_accessible);
    println!("\n{}", reachability_advice(reachability));
    Ok(())
}

fn print_network(analysis: &[VpcAnalysis]) {
    section("🌐 Network");
    if analysis.is_empty() {
        println!("   No VPCs found");
    }
    for entry in analysis {
        println!(
            "   VPC {} ({}): {} public, {} private subnets",
            entry.vpc.id,
            or_na(entry.vpc.cidr.as_deref()),
            entry.public_subnets(),
            entry.private_subnets()
        );
        for subnet in &entry.subnets {
            println!(
                "     - {} ({}) - {} [{}]",
                subnet.id,
                or_na(subnet.availability_zone.as_deref()),
                or_na(subnet.cidr.as_deref()),
                subnet.visibility()
            );
        }
    }
}

fn reachability_advice(reachability: Reachability) -> &'static str {
    match reachability {
        Reachability::Internet => {
            "✅ Reachable from the internet once the security group allows 5432 from your IP"
        }
        Reachability::PublicAccessDisabled => {
            "💡 Public subnets exist but no instance is publicly accessible: `kbops db public enable`"
        }
        Reachability::VpcOnly => {
            "🔒 Private subnets only. Use the Data API, CloudShell, or a host inside the VPC"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask(Some("hunter2")), "*******");
        assert_eq!(mask(Some(&"x".repeat(40))), "*".repeat(12));
        assert_eq!(mask(Some("")), "N/A");
        assert_eq!(mask(None), "N/A");
    }

    #[test]
    fn test_role_password_hint_names_config_variable() {
        let hint = role_password_hint("bedrock_user");
        assert!(hint.contains("bedrock_user"));
        assert!(hint.contains(ROLE_PASSWORD_ENV));
        assert_eq!(ROLE_PASSWORD_ENV, "BEDROCK_USER_PASSWORD");
    }

    #[test]
    fn test_reachability_advice() {
        assert!(reachability_advice(Reachability::VpcOnly).contains("Data API"));
        assert!(reachability_advice(Reachability::PublicAccessDisabled)
            .contains("kbops db public enable"));
    }

    #[test]
    fn test_script_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup_vector_database.sql");

        script(&AppConfig::default(), Some(path.clone())).unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("CREATE EXTENSION IF NOT EXISTS vector"));
        assert!(written.contains("bedrock_integration.bedrock_kb"));
    }
}
