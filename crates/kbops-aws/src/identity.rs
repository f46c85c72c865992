//! Credential and service access checks
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, items, text, text_or_default, AwsContext};
use async_trait::async_trait;
use kbops_core::{CallerIdentity, IdentityProbe, Result};

/// STS-backed identity probe
#[derive(Clone, Debug)]
pub struct StsIdentity {
    client: aws_sdk_sts::Client,
}

impl StsIdentity {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(ctx.sdk_config()),
        }
    }
}

#[async_trait]
impl IdentityProbe for StsIdentity {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let out = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| from_sdk("sts", e))?;

        Ok(CallerIdentity {
            account: text_or_default(out.account()),
            arn: text_or_default(out.arn()),
            user_id: text(out.user_id()),
        })
    }
}

/// Bedrock control-plane access check
#[derive(Clone, Debug)]
pub struct FoundationModels {
    client: aws_sdk_bedrock::Client,
}

impl FoundationModels {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_bedrock::Client::new(ctx.sdk_config()),
        }
    }

    /// IDs of the foundation models visible to this account
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let out = self
            .client
            .list_foundation_models()
            .send()
            .await
            .map_err(|e| from_sdk("bedrock", e))?;

        Ok(items(out.model_summaries())
            .iter()
            .filter_map(|m| text(m.model_id()))
            .collect())
    }
}
