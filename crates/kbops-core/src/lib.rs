//! kbops Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout kbops:
//! - Common error types and error classification
//! - Knowledge base, ingestion and collection records
//! - Shared traits for model invocation, retrieval and SQL execution
//! - Configuration management
//! - Fixed-interval polling of asynchronous platform jobs
//! - VPC and subnet reachability analysis

pub mod config;
pub mod network;
pub mod polling;
pub mod records;

pub use config::{
    foundation_model_arn, AppConfig, AuroraConfig, AwsConfig, ChatConfig, CollectionConfig,
    ConfigError, KnowledgeBaseConfig, LoggingConfig, PollingConfig, ServerConfig, StorageBackend,
    ROLE_PASSWORD_ENV,
};
pub use network::{
    analyze_vpcs, NetworkInspector, Reachability, SubnetSummary, VpcAnalysis, VpcSummary,
};
pub use polling::poll_until;
pub use records::{DatabaseCredentials, ResourceRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Knowledge base ID shipped as the UI default. Seeing it means demo mode.
pub const DEMO_KB_ID: &str = "your-knowledge-base-id";

/// Returns true when `kb_id` is the placeholder sentinel (or blank)
pub fn is_demo_kb_id(kb_id: &str) -> bool {
    let trimmed = kb_id.trim();
    trimmed.is_empty() || trimmed == DEMO_KB_ID
}

// ============================================================================
// Error Types
// ============================================================================

/// Core error type for kbops operations
#[derive(Error, Debug)]
pub enum KbError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("AWS credentials unavailable: {0}")]
    Credentials(String),

    #[error("{service} error ({code}): {message}")]
    Service {
        service: String,
        code: String,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KbError>;

impl From<ConfigError> for KbError {
    fn from(err: ConfigError) -> Self {
        KbError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        KbError::Validation(format!("JSON: {err}"))
    }
}

/// Coarse classification used to pick a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    Other,
}

impl ErrorKind {
    /// Classify a raw error message by substring
    pub fn from_message(message: &str) -> Self {
        if message.contains("NotFound") || message.contains("ResourceNotFound") {
            Self::NotFound
        } else if message.contains("AccessDenied") {
            Self::AccessDenied
        } else {
            Self::Other
        }
    }
}

impl KbError {
    /// Classify this error, falling back to the message text for
    /// variants that carry a raw service message
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbError::NotFound(_) => ErrorKind::NotFound,
            KbError::AccessDenied(_) => ErrorKind::AccessDenied,
            KbError::Service { code, message, .. } => {
                match ErrorKind::from_message(code) {
                    ErrorKind::Other => ErrorKind::from_message(message),
                    kind => kind,
                }
            }
            other => ErrorKind::from_message(&other.to_string()),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, KbError::Conflict(_))
    }
}

// ============================================================================
// Knowledge Base Records
// ============================================================================

/// Knowledge base as listed by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full knowledge base description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseDetail {
    pub id: String,
    pub name: String,
    pub arn: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub failure_reasons: Vec<String>,
}

/// Data source attached to a knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
}

/// Ingestion job state reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Stopping,
    Stopped,
    Unknown(String),
}

impl IngestionStatus {
    /// Parse the platform's status string
    pub fn parse(s: &str) -> Self {
        match s {
            "STARTING" => Self::Starting,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETE" => Self::Complete,
            "FAILED" => Self::Failed,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// A terminal status will not change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "STARTING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: String,
    pub status: IngestionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub failure_reasons: Vec<String>,
}

// ============================================================================
// Vector Collections
// ============================================================================

/// Serverless vector collection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionStatus {
    Creating,
    Active,
    Deleting,
    Failed,
    Unknown(String),
}

impl CollectionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "DELETING" => Self::Deleting,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "CREATING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Deleting => write!(f, "DELETING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Serverless vector collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
    pub arn: String,
    pub status: CollectionStatus,
    pub endpoint: Option<String>,
}

// ============================================================================
// Retrieval and Generation
// ============================================================================

/// A passage returned by knowledge base retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Chunk text
    pub text: String,

    /// Similarity score
    pub score: Option<f64>,

    /// Source document location (s3:// URI)
    pub source_uri: Option<String>,
}

/// Answer produced by managed retrieve-and-generate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub citations: Vec<String>,
}

/// Sampling parameters passed to a model invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model_id: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Account identity behind the active credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: Option<String>,
}

/// Result of one SQL statement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementOutcome {
    /// Column names, empty for statements that return no rows
    pub columns: Vec<String>,

    /// Rows rendered as text
    pub rows: Vec<Vec<String>>,

    /// Rows affected, when the backend reports it
    pub rows_affected: Option<u64>,
}

impl StatementOutcome {
    /// First column of the first row
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first().and_then(|r| r.first()).map(String::as_str)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for a single user prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Trait for knowledge base retrieval backends
#[async_trait::async_trait]
pub trait KnowledgeBaseRetriever: Send + Sync {
    /// Retrieve the passages most similar to `query`
    async fn retrieve(
        &self,
        kb_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>>;
}

/// Trait for resolving the caller identity (credential check)
#[async_trait::async_trait]
pub trait IdentityProbe: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity>;
}

/// Trait for anything that can run a SQL statement
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<StatementOutcome>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_kb_id() {
        assert!(is_demo_kb_id(DEMO_KB_ID));
        assert!(is_demo_kb_id("  your-knowledge-base-id "));
        assert!(is_demo_kb_id(""));
        assert!(!is_demo_kb_id("L3CRT5Q79H"));
    }

    #[test]
    fn test_error_kind_from_message() {
        assert_eq!(
            ErrorKind::from_message("ResourceNotFoundException: no kb"),
            ErrorKind::NotFound
        );
        assert_eq!(
            ErrorKind::from_message("AccessDeniedException: nope"),
            ErrorKind::AccessDenied
        );
        assert_eq!(ErrorKind::from_message("throttled"), ErrorKind::Other);
    }

    #[test]
    fn test_error_kind_service_code() {
        let err = KbError::Service {
            service: "bedrock-agent-runtime".to_string(),
            code: "AccessDeniedException".to_string(),
            message: "User is not authorized".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let err = KbError::Service {
            service: "bedrock-agent-runtime".to_string(),
            code: "ValidationException".to_string(),
            message: "ResourceNotFound for id".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(KbError::NotFound("kb".into()).kind(), ErrorKind::NotFound);
        assert_eq!(KbError::Llm("boom".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_ingestion_status() {
        assert_eq!(IngestionStatus::parse("COMPLETE"), IngestionStatus::Complete);
        assert!(IngestionStatus::parse("FAILED").is_terminal());
        assert!(!IngestionStatus::parse("IN_PROGRESS").is_terminal());
        let unknown = IngestionStatus::parse("PAUSED");
        assert_eq!(unknown.to_string(), "PAUSED");
        assert!(!unknown.is_terminal());
    }

    #[test]
    fn test_collection_status() {
        assert!(CollectionStatus::parse("ACTIVE").is_terminal());
        assert!(!CollectionStatus::parse("CREATING").is_terminal());
        assert_eq!(CollectionStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_statement_outcome_scalar() {
        let outcome = StatementOutcome {
            columns: vec!["count".into()],
            rows: vec![vec!["42".into()]],
            rows_affected: None,
        };
        assert_eq!(outcome.scalar(), Some("42"));
        assert_eq!(StatementOutcome::default().scalar(), None);
    }
}
