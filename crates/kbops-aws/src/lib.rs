//! kbops AWS - SDK adapters
//!
//! Thin wrappers over the AWS SDK for Rust. Every adapter is built from a
//! shared [`AwsContext`] and returns `kbops_core::Result`, mapping SDK
//! errors onto [`KbError`] by error code.
//!
//! Author: hephaex@gmail.com

pub mod aurora;
pub mod collection;
pub mod data_api;
pub mod documents;
pub mod identity;
pub mod index;
pub mod knowledge_base;
pub mod llm;
pub mod network;
pub mod retriever;
pub mod roles;

pub use aurora::{AuroraAdmin, ClusterInfo, InstanceAccess};
pub use collection::{CollectionAdmin, Provisioned};
pub use data_api::DataApiExecutor;
pub use documents::DocumentBucket;
pub use identity::{FoundationModels, StsIdentity};
pub use index::VectorIndexClient;
pub use knowledge_base::{CreateKnowledgeBase, KnowledgeBaseAdmin, VectorStorage};
pub use llm::BedrockLlm;
pub use network::Ec2Network;
pub use retriever::BedrockRetriever;
pub use roles::RoleAdmin;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata};
use chrono::{DateTime, Utc};
use kbops_core::{AwsConfig, KbError};

/// Shared AWS configuration for every client
#[derive(Clone, Debug)]
pub struct AwsContext {
    sdk: SdkConfig,
    region: String,
}

impl AwsContext {
    /// Resolve credentials and region the standard way (env, profile, IMDS)
    pub async fn load(config: &AwsConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }

        let sdk = loader.load().await;
        tracing::debug!(region = %config.region, profile = ?config.profile, "AWS config loaded");

        Self {
            sdk,
            region: config.region.clone(),
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map an SDK error onto `KbError` using its error code
pub(crate) fn from_sdk<E>(service: &str, err: E) -> KbError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    tracing::debug!(service, code = ?code, %message, "AWS call failed");
    classify(service, code.as_deref(), &message)
}

/// Classify a service failure by code, falling back to the message
pub fn classify(service: &str, code: Option<&str>, message: &str) -> KbError {
    match code {
        Some("ResourceNotFoundException" | "NoSuchEntity" | "NoSuchBucket" | "DBClusterNotFoundFault") => {
            KbError::NotFound(format!("{service}: {message}"))
        }
        Some(c) if c.starts_with("AccessDenied") || c == "UnauthorizedOperation" => {
            KbError::AccessDenied(format!("{service}: {message}"))
        }
        Some("ConflictException" | "EntityAlreadyExists")
        | Some("ResourceAlreadyExistsException") => KbError::Conflict(format!("{service}: {message}")),
        Some("ExpiredToken" | "ExpiredTokenException" | "InvalidClientTokenId"
            | "UnrecognizedClientException") => KbError::Credentials(message.to_string()),
        Some(c) => KbError::Service {
            service: service.to_string(),
            code: c.to_string(),
            message: message.to_string(),
        },
        None if message.to_lowercase().contains("credentials") => {
            KbError::Credentials(message.to_string())
        }
        None => KbError::Service {
            service: service.to_string(),
            code: "Unknown".to_string(),
            message: message.to_string(),
        },
    }
}

/// Wrap a request-building failure
pub(crate) fn invalid(err: impl std::fmt::Display) -> KbError {
    KbError::Validation(format!("invalid request: {err}"))
}

// ============================================================================
// Accessor helpers
// ============================================================================
//
// SDK accessors return `&T` for required members and `Option<&T>` for
// optional ones, and members move between the two across releases.
// These helpers accept either form.

pub(crate) fn text<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    value.into().map(str::to_string)
}

pub(crate) fn text_or_default<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

pub(crate) fn items<'a, T: 'a>(value: impl Into<Option<&'a [T]>>) -> &'a [T] {
    value.into().unwrap_or_default()
}

pub(crate) fn opt<T>(value: impl Into<Option<T>>) -> Option<T> {
    value.into()
}

pub(crate) fn to_utc(dt: &aws_sdk_bedrockagent::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        assert!(matches!(
            classify("bedrock-agent", Some("ResourceNotFoundException"), "no kb"),
            KbError::NotFound(_)
        ));
        assert!(matches!(
            classify("bedrock-agent", Some("AccessDeniedException"), "denied"),
            KbError::AccessDenied(_)
        ));
        assert!(matches!(
            classify("iam", Some("EntityAlreadyExists"), "role exists"),
            KbError::Conflict(_)
        ));
        assert!(matches!(
            classify("aoss", Some("ConflictException"), "policy exists"),
            KbError::Conflict(_)
        ));
        assert!(matches!(
            classify("sts", Some("ExpiredToken"), "expired"),
            KbError::Credentials(_)
        ));
    }

    #[test]
    fn test_classify_fallbacks() {
        match classify("bedrock-runtime", Some("ThrottlingException"), "slow down") {
            KbError::Service { service, code, .. } => {
                assert_eq!(service, "bedrock-runtime");
                assert_eq!(code, "ThrottlingException");
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            classify("sts", None, "failed to load credentials from the chain"),
            KbError::Credentials(_)
        ));
        assert!(matches!(
            classify("sts", None, "dispatch failure"),
            KbError::Service { .. }
        ));
    }

    #[test]
    fn test_accessor_helpers() {
        assert_eq!(text("abc"), Some("abc".to_string()));
        assert_eq!(text(None::<&str>), None);
        assert_eq!(text_or_default(None::<&str>), "");
        let list = [1, 2, 3];
        assert_eq!(items(&list[..]).len(), 3);
        assert!(items(None::<&[i32]>).is_empty());
        assert_eq!(opt::<f64>(0.5), Some(0.5));
    }

    #[test]
    fn test_to_utc() {
        let dt = aws_sdk_bedrockagent::primitives::DateTime::from_secs(1_700_000_000);
        assert_eq!(to_utc(&dt).unwrap().timestamp(), 1_700_000_000);
    }
}
