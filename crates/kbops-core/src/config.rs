//! kbops Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments. Defaults match the heavy machinery demo
//! deployment in us-west-2.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// AWS account and region
    pub aws: AwsConfig,

    /// Knowledge base and its S3 data source
    pub knowledge_base: KnowledgeBaseConfig,

    /// OpenSearch Serverless collection
    pub collection: CollectionConfig,

    /// Aurora PostgreSQL vector storage
    pub aurora: AuroraConfig,

    /// Chat defaults
    pub chat: ChatConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Polling of asynchronous platform jobs
    pub polling: PollingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p)?.with_env_override(),
            None => Self::from_env(),
        }
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // AWS
        if let Some(region) = env_var("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(profile) = env_var("AWS_PROFILE") {
            self.aws.profile = Some(profile);
        }

        // Knowledge base
        if let Some(id) = env_var("KB_ID") {
            self.knowledge_base.kb_id = id;
        }
        if let Some(bucket) = env_var("KB_S3_BUCKET") {
            self.knowledge_base.s3_bucket = bucket;
        }
        if let Some(prefix) = env_var("KB_S3_PREFIX") {
            self.knowledge_base.s3_prefix = prefix;
        }
        if let Some(model) = env_var("KB_EMBEDDING_MODEL") {
            self.knowledge_base.embedding_model = model;
        }
        if let Some(storage) = env_var("KB_STORAGE") {
            self.knowledge_base.storage = storage.parse()?;
        }

        // Collection
        if let Some(name) = env_var("AOSS_COLLECTION") {
            self.collection.name = name;
        }
        if let Some(endpoint) = env_var("AOSS_ENDPOINT") {
            self.collection.endpoint = Some(endpoint);
        }

        // Aurora
        if let Some(id) = env_var("AURORA_CLUSTER_ID") {
            self.aurora.cluster_identifier = id;
        }
        if let Some(arn) = env_var("AURORA_CLUSTER_ARN") {
            self.aurora.cluster_arn = Some(arn);
        }
        if let Some(arn) = env_var("AURORA_SECRET_ARN") {
            self.aurora.secret_arn = Some(arn);
        }
        if let Some(host) = env_var("AURORA_HOST") {
            self.aurora.host = Some(host);
        }
        if let Some(db) = env_var("AURORA_DATABASE") {
            self.aurora.database = db;
        }
        if let Some(port) = env_var("AURORA_PORT") {
            self.aurora.port = parse_value("AURORA_PORT", port)?;
        }
        if let Some(pass) = env_var(ROLE_PASSWORD_ENV) {
            self.aurora.role_password = Some(pass);
        }

        // Chat
        if let Some(model) = env_var("CHAT_MODEL") {
            self.chat.default_model = model;
        }
        if let Some(t) = env_var("CHAT_TEMPERATURE") {
            self.chat.temperature = parse_value("CHAT_TEMPERATURE", t)?;
        }
        if let Some(p) = env_var("CHAT_TOP_P") {
            self.chat.top_p = parse_value("CHAT_TOP_P", p)?;
        }

        // Server
        if let Some(host) = env_var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(max) = env_var("API_MAX_SESSIONS") {
            self.server.max_sessions = parse_value("API_MAX_SESSIONS", max)?;
        }
        if let Some(origins) = env_var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Polling
        if let Some(secs) = env_var("POLL_INTERVAL_SECS") {
            self.polling.interval_secs = parse_value("POLL_INTERVAL_SECS", secs)?;
        }

        // Logging
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_var("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(())
    }

    /// Foundation model ARN for the embedding model
    pub fn embedding_model_arn(&self) -> String {
        foundation_model_arn(&self.aws.region, &self.knowledge_base.embedding_model)
    }
}

/// Environment variable carrying the knowledge base role password
pub const ROLE_PASSWORD_ENV: &str = "BEDROCK_USER_PASSWORD";

/// Build `arn:aws:bedrock:<region>::foundation-model/<model>`
pub fn foundation_model_arn(region: &str, model_id: &str) -> String {
    format!("arn:aws:bedrock:{region}::foundation-model/{model_id}")
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// AWS account and region
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region for every client
    pub region: String,

    /// Named profile from the shared config files
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            profile: None,
        }
    }
}

/// Vector store behind a knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    OpenSearch,
    Aurora,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opensearch" | "aoss" | "opensearch_serverless" => Ok(Self::OpenSearch),
            "aurora" | "rds" | "postgres" => Ok(Self::Aurora),
            _ => Err(ConfigError::InvalidValue {
                key: "KB_STORAGE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Knowledge base configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// Knowledge base used by chat; the placeholder selects demo mode
    pub kb_id: String,

    /// Name used when creating the knowledge base
    pub name: String,

    /// Description used when creating the knowledge base
    pub description: String,

    /// Bucket holding the source documents
    pub s3_bucket: String,

    /// Key prefix of the source documents
    pub s3_prefix: String,

    /// Embedding model ID
    pub embedding_model: String,

    /// Vector store backend
    pub storage: StorageBackend,

    /// Vector index name inside the collection
    pub vector_index: String,

    /// Index field holding the embedding
    pub vector_field: String,

    /// Index field holding the chunk text
    pub text_field: String,

    /// Index field holding metadata
    pub metadata_field: String,

    /// Where create writes the resulting IDs
    pub record_path: PathBuf,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            kb_id: crate::DEMO_KB_ID.to_string(),
            name: "heavy-machinery-knowledge-base".to_string(),
            description:
                "Knowledge Base for heavy machinery equipment specifications and maintenance"
                    .to_string(),
            s3_bucket: "bedrock-kb-133720367604".to_string(),
            s3_prefix: "documents/".to_string(),
            embedding_model: "amazon.titan-embed-text-v1".to_string(),
            storage: StorageBackend::OpenSearch,
            vector_index: "heavy-machinery-index".to_string(),
            vector_field: "vector".to_string(),
            text_field: "text".to_string(),
            metadata_field: "metadata".to_string(),
            record_path: PathBuf::from("knowledge_base_info.json"),
        }
    }
}

impl KnowledgeBaseConfig {
    pub fn data_source_name(&self) -> String {
        format!("{}-s3-source", self.name)
    }

    pub fn role_name(&self) -> String {
        format!("{}-role", self.name)
    }

    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.s3_bucket)
    }
}

/// OpenSearch Serverless collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Collection name
    pub name: String,

    /// Prefix for security policy names (policy names max out at 32 chars)
    pub policy_prefix: String,

    /// Collection endpoint, once known
    pub endpoint: Option<String>,

    /// Vector dimension (must match the embedding model)
    pub dimension: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: "heavy-machinery-kb".to_string(),
            policy_prefix: "machinery-kb".to_string(),
            endpoint: None,
            dimension: 1536,
        }
    }
}

/// Aurora PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuroraConfig {
    /// Cluster identifier
    pub cluster_identifier: String,

    /// Cluster ARN (Data API and RDS storage)
    pub cluster_arn: Option<String>,

    /// Secrets Manager ARN with the master credentials
    pub secret_arn: Option<String>,

    /// Writer endpoint; looked up from the cluster when unset
    pub host: Option<String>,

    /// Port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Schema for the knowledge base table
    pub schema: String,

    /// Knowledge base table
    pub table: String,

    /// Login role used by the knowledge base
    pub role: String,

    /// Password for the knowledge base role; only from the environment
    #[serde(skip)]
    pub role_password: Option<String>,

    /// Embedding dimension
    pub dimension: usize,
}

impl Default for AuroraConfig {
    fn default() -> Self {
        Self {
            cluster_identifier: "my-aurora-serverless".to_string(),
            cluster_arn: None,
            secret_arn: None,
            host: None,
            port: 5432,
            database: "myapp".to_string(),
            schema: "bedrock_integration".to_string(),
            table: "bedrock_kb".to_string(),
            role: "bedrock_user".to_string(),
            role_password: None,
            dimension: 1536,
        }
    }
}

impl AuroraConfig {
    /// Schema-qualified table name
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Chat defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Models offered in the selector
    pub models: Vec<String>,

    /// Preselected model
    pub default_model: String,

    /// Temperature for generation
    pub temperature: f32,

    /// Nucleus sampling parameter
    pub top_p: f32,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Passages requested from retrieval
    pub number_of_results: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
                "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string(),
            ],
            default_model: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 1024,
            number_of_results: 5,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Seconds allowed for the start-up credential probe
    pub credential_probe_timeout_secs: u64,

    /// Chat sessions kept in memory; the least recently used is evicted
    pub max_sessions: usize,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            credential_probe_timeout_secs: 10,
            max_sessions: 1000,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Polling of asynchronous platform jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed sleep between status checks
    pub interval_secs: u64,

    /// Give up after this many checks
    pub max_attempts: Option<u32>,

    /// Wait after creating an IAM role before using it
    pub role_propagation_secs: u64,

    /// Wait after creating security policies
    pub policy_propagation_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_attempts: Some(20),
            role_propagation_secs: 30,
            policy_propagation_secs: 10,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
