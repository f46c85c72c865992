//! kbops CLI - Bedrock knowledge base administration
//!
//! Usage:
//!   kbops check
//!   kbops kb list | status <id> | create | test <id> | query <id> <text>
//!   kbops ingest status <kb> | start <kb>
//!   kbops collection setup | status | index
//!   kbops db credentials | script | setup | verify | exec <sql> | public <action> | info
//!   kbops models list | test
//!   kbops chat
//!   kbops guide kb | db

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::{
    chat::ChatArgs, collection::CollectionCommand, db::DbCommand, guide::GuideCommand,
    ingest::IngestCommand, kb::KbCommand, models::ModelsCommand,
};
use kbops_core::{AppConfig, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kbops")]
#[command(about = "Bedrock knowledge base operations for heavy machinery documents")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true, env = "KBOPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check credentials, Bedrock access and source documents
    Check,
    /// Manage knowledge bases
    Kb {
        #[command(subcommand)]
        action: KbCommand,
    },
    /// Manage ingestion jobs
    Ingest {
        #[command(subcommand)]
        action: IngestCommand,
    },
    /// Manage the OpenSearch Serverless collection
    Collection {
        #[command(subcommand)]
        action: CollectionCommand,
    },
    /// Manage Aurora PostgreSQL vector storage
    Db {
        #[command(subcommand)]
        action: DbCommand,
    },
    /// Inspect and test foundation models
    Models {
        #[command(subcommand)]
        action: ModelsCommand,
    },
    /// Chat with the heavy machinery assistant in the terminal
    Chat(ChatArgs),
    /// Print manual setup steps
    Guide {
        #[command(subcommand)]
        topic: GuideCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(&config).await,
        Commands::Kb { action } => commands::kb::run(&config, action).await,
        Commands::Ingest { action } => commands::ingest::run(&config, action).await,
        Commands::Collection { action } => commands::collection::run(&config, action).await,
        Commands::Db { action } => commands::db::run(&config, action).await,
        Commands::Models { action } => commands::models::run(&config, action).await,
        Commands::Chat(args) => commands::chat::run(&config, args).await,
        Commands::Guide { topic } => commands::guide::run(&config, topic),
    }
}

/// Logs go to stderr so command output stays clean
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kbops={0},kbops_aws={0},kbops_vector={0},kbops_chat={0}",
            logging.level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use commands::db::PublicAction;
    use kbops_core::StorageBackend;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_kb_create() {
        let cli = Cli::try_parse_from(["kbops", "kb", "create", "--storage", "aurora", "--no-ingest"])
            .unwrap();
        match cli.command {
            Commands::Kb {
                action: KbCommand::Create { storage, no_ingest },
            } => {
                assert_eq!(storage, Some(StorageBackend::Aurora));
                assert!(no_ingest);
            }
            _ => panic!("expected kb create"),
        }
    }

    #[test]
    fn test_parse_db_public() {
        let cli = Cli::try_parse_from(["kbops", "db", "public", "disable"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Db {
                action: DbCommand::Public {
                    action: PublicAction::Disable
                }
            }
        ));
        assert!(Cli::try_parse_from(["kbops", "db", "public", "toggle"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "kbops",
            "ingest",
            "start",
            "KB123",
            "--wait",
            "--config",
            "kbops.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("kbops.toml")));
        match cli.command {
            Commands::Ingest {
                action:
                    IngestCommand::Start {
                        kb_id,
                        data_source,
                        wait,
                    },
            } => {
                assert_eq!(kb_id, "KB123");
                assert_eq!(data_source, None);
                assert!(wait);
            }
            _ => panic!("expected ingest start"),
        }
    }

    #[test]
    fn test_parse_chat_options() {
        let cli = Cli::try_parse_from(["kbops", "chat", "--kb-id", "ABCD1234EF", "--temperature", "0.3"])
            .unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.kb_id.as_deref(), Some("ABCD1234EF"));
                assert_eq!(args.temperature, Some(0.3));
            }
            _ => panic!("expected chat"),
        }
    }
}
