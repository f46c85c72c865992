//! OpenSearch Serverless collection administration
//!
//! Creates the encryption, network and data-access policies a vector
//! collection needs, then creates the collection and waits for it to become
//! active. A `ConflictException` from any create call means the resource
//! already exists and is treated as success.
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, items, opt, text, text_or_default, AwsContext};
use aws_sdk_opensearchserverless::types::{
    AccessPolicyType, CollectionDetail, CollectionStatus as SdkCollectionStatus,
    CollectionSummary, CollectionType, CreateCollectionDetail, SecurityPolicyType,
};
use kbops_core::{
    poll_until, CollectionConfig, CollectionInfo, CollectionStatus, KbError, PollingConfig,
    Result,
};
use serde_json::{json, Value};

/// Outcome of an idempotent create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExists,
}

// ============================================================================
// Policy documents
// ============================================================================

/// Encryption policy using an AWS-owned key
pub fn encryption_policy(collection: &str) -> Value {
    json!({
        "Rules": [
            {
                "ResourceType": "collection",
                "Resource": [format!("collection/{collection}")]
            }
        ],
        "AWSOwnedKey": true
    })
}

/// Network policy allowing public access to the collection and dashboard
pub fn network_policy(collection: &str) -> Value {
    let resource = format!("collection/{collection}");
    json!([
        {
            "Rules": [
                { "ResourceType": "collection", "Resource": [resource] },
                { "ResourceType": "dashboard", "Resource": [resource] }
            ],
            "AllowFromPublic": true
        }
    ])
}

/// Data access policy granting collection and index permissions to principals
pub fn data_access_policy(collection: &str, principals: &[String]) -> Value {
    json!([
        {
            "Rules": [
                {
                    "ResourceType": "collection",
                    "Resource": [format!("collection/{collection}")],
                    "Permission": [
                        "aoss:CreateCollectionItems",
                        "aoss:DeleteCollectionItems",
                        "aoss:UpdateCollectionItems",
                        "aoss:DescribeCollectionItems"
                    ]
                },
                {
                    "ResourceType": "index",
                    "Resource": [format!("index/{collection}/*")],
                    "Permission": [
                        "aoss:CreateIndex",
                        "aoss:DeleteIndex",
                        "aoss:UpdateIndex",
                        "aoss:DescribeIndex",
                        "aoss:ReadDocument",
                        "aoss:WriteDocument"
                    ]
                }
            ],
            "Principal": principals
        }
    ])
}

// ============================================================================
// Client
// ============================================================================

/// OpenSearch Serverless control-plane client
#[derive(Clone, Debug)]
pub struct CollectionAdmin {
    client: aws_sdk_opensearchserverless::Client,
    config: CollectionConfig,
}

impl CollectionAdmin {
    pub fn new(ctx: &AwsContext, config: CollectionConfig) -> Self {
        Self {
            client: aws_sdk_opensearchserverless::Client::new(ctx.sdk_config()),
            config,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.config.name
    }

    pub async fn create_encryption_policy(&self) -> Result<Provisioned> {
        let policy = encryption_policy(&self.config.name).to_string();
        let result = self
            .client
            .create_security_policy()
            .name(format!("{}-encryption", self.config.policy_prefix))
            .r#type(SecurityPolicyType::Encryption)
            .policy(policy)
            .description("Encryption policy for heavy machinery knowledge base collection")
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e));
        provisioned("encryption policy", result)
    }

    pub async fn create_network_policy(&self) -> Result<Provisioned> {
        let policy = network_policy(&self.config.name).to_string();
        let result = self
            .client
            .create_security_policy()
            .name(format!("{}-network", self.config.policy_prefix))
            .r#type(SecurityPolicyType::Network)
            .policy(policy)
            .description("Network policy for heavy machinery knowledge base collection")
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e));
        provisioned("network policy", result)
    }

    pub async fn create_data_access_policy(&self, principals: &[String]) -> Result<Provisioned> {
        let policy = data_access_policy(&self.config.name, principals).to_string();
        let result = self
            .client
            .create_access_policy()
            .name(format!("{}-access", self.config.policy_prefix))
            .r#type(AccessPolicyType::Data)
            .policy(policy)
            .description("Data access policy for heavy machinery knowledge base collection")
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e));
        provisioned("data access policy", result)
    }

    /// Create the VECTORSEARCH collection, or look up the existing one
    pub async fn create_collection(&self) -> Result<(CollectionInfo, Provisioned)> {
        let result = self
            .client
            .create_collection()
            .name(&self.config.name)
            .r#type(CollectionType::Vectorsearch)
            .description("Vector collection for heavy machinery knowledge base")
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e));

        match result {
            Ok(out) => {
                let detail = opt::<&CreateCollectionDetail>(out.create_collection_detail())
                    .ok_or_else(|| {
                        KbError::Validation("create_collection returned nothing".to_string())
                    })?;
                let info = CollectionInfo {
                    id: text_or_default(detail.id()),
                    name: text_or_default(detail.name()),
                    arn: text_or_default(detail.arn()),
                    status: status_of(detail.status()),
                    endpoint: None,
                };
                tracing::info!(id = %info.id, arn = %info.arn, "collection created");
                Ok((info, Provisioned::Created))
            }
            Err(e) if e.is_conflict() => {
                tracing::info!(name = %self.config.name, "collection already exists");
                let info = self
                    .find_by_name(&self.config.name)
                    .await?
                    .ok_or_else(|| KbError::NotFound(format!("collection {}", self.config.name)))?;
                Ok((info, Provisioned::AlreadyExists))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch one collection by ID, including its endpoint
    pub async fn get_by_id(&self, id: &str) -> Result<Option<CollectionInfo>> {
        let out = self
            .client
            .batch_get_collection()
            .ids(id)
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e))?;
        Ok(items(out.collection_details()).first().map(convert_detail))
    }

    /// Fetch one collection by name, including its endpoint
    pub async fn find_by_name(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let out = self
            .client
            .batch_get_collection()
            .names(name)
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e))?;
        Ok(items(out.collection_details()).first().map(convert_detail))
    }

    /// List all collections (without endpoints)
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let out = self
            .client
            .list_collections()
            .send()
            .await
            .map_err(|e| from_sdk("aoss", e))?;
        Ok(items(out.collection_summaries())
            .iter()
            .map(convert_summary)
            .collect())
    }

    /// Poll until the collection is ACTIVE; FAILED is an error
    pub async fn wait_until_active(&self, id: &str, polling: &PollingConfig) -> Result<CollectionInfo> {
        let info = poll_until(
            "collection",
            polling.interval(),
            polling.max_attempts,
            || async {
                let info = self
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| KbError::NotFound(format!("collection {id}")))?;
                tracing::info!(id, status = %info.status, "collection status");
                Ok(info)
            },
            |info| info.status.is_terminal(),
        )
        .await?;

        if info.status == CollectionStatus::Failed {
            return Err(KbError::Service {
                service: "aoss".to_string(),
                code: "CollectionFailed".to_string(),
                message: format!("collection {id} creation failed"),
            });
        }
        Ok(info)
    }
}

fn provisioned<T>(what: &str, result: Result<T>) -> Result<Provisioned> {
    match result {
        Ok(_) => {
            tracing::info!("created {what}");
            Ok(Provisioned::Created)
        }
        Err(e) if e.is_conflict() => {
            tracing::info!("{what} already exists");
            Ok(Provisioned::AlreadyExists)
        }
        Err(e) => Err(e),
    }
}

fn status_of<'a>(status: impl Into<Option<&'a SdkCollectionStatus>>) -> CollectionStatus {
    CollectionStatus::parse(status.into().map(|s| s.as_str()).unwrap_or_default())
}

fn convert_detail(detail: &CollectionDetail) -> CollectionInfo {
    CollectionInfo {
        id: text_or_default(detail.id()),
        name: text_or_default(detail.name()),
        arn: text_or_default(detail.arn()),
        status: status_of(detail.status()),
        endpoint: text(detail.collection_endpoint()),
    }
}

fn convert_summary(summary: &CollectionSummary) -> CollectionInfo {
    CollectionInfo {
        id: text_or_default(summary.id()),
        name: text_or_default(summary.name()),
        arn: text_or_default(summary.arn()),
        status: status_of(summary.status()),
        endpoint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_policy() {
        let policy = encryption_policy("heavy-machinery-kb");
        assert_eq!(policy["AWSOwnedKey"], true);
        assert_eq!(policy["Rules"][0]["ResourceType"], "collection");
        assert_eq!(policy["Rules"][0]["Resource"][0], "collection/heavy-machinery-kb");
    }

    #[test]
    fn test_network_policy() {
        let policy = network_policy("heavy-machinery-kb");
        let rules = policy[0]["Rules"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1]["ResourceType"], "dashboard");
        assert_eq!(policy[0]["AllowFromPublic"], true);
    }

    #[test]
    fn test_data_access_policy() {
        let principals = vec!["arn:aws:iam::133720367604:user/admin".to_string()];
        let policy = data_access_policy("heavy-machinery-kb", &principals);

        assert_eq!(policy[0]["Principal"][0], principals[0]);
        assert_eq!(policy[0]["Rules"][1]["Resource"][0], "index/heavy-machinery-kb/*");
        let perms = policy[0]["Rules"][1]["Permission"].as_array().unwrap();
        assert!(perms.iter().any(|p| p == "aoss:WriteDocument"));
        assert_eq!(perms.len(), 6);
    }

    #[test]
    fn test_provisioned_conflict_is_success() {
        let conflict: Result<()> = Err(KbError::Conflict("aoss: policy exists".into()));
        assert_eq!(
            provisioned("network policy", conflict).unwrap(),
            Provisioned::AlreadyExists
        );

        let denied: Result<()> = Err(KbError::AccessDenied("aoss: denied".into()));
        assert!(provisioned("network policy", denied).is_err());
        assert_eq!(provisioned("x", Ok(())).unwrap(), Provisioned::Created);
    }
}
