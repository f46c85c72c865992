//! IAM service role for the knowledge base
//!
//! Author: hephaex@gmail.com

use crate::collection::Provisioned;
use crate::{from_sdk, opt, text_or_default, AwsContext};
use aws_sdk_iam::types::Role;
use kbops_core::{KbError, Result};
use serde_json::{json, Value};

/// Managed policies attached to a newly created role
pub const MANAGED_POLICIES: [&str; 2] = [
    "arn:aws:iam::aws:policy/AmazonBedrockFullAccess",
    "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess",
];

/// Trust policy letting Bedrock assume the role
pub fn bedrock_trust_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Service": "bedrock.amazonaws.com" },
                "Action": "sts:AssumeRole"
            }
        ]
    })
}

/// Inline policy scoped to model invocation, the collection and the bucket
pub fn knowledge_base_access_policy(region: &str, bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [
                    "bedrock:InvokeModel",
                    "bedrock:Retrieve",
                    "bedrock:RetrieveAndGenerate"
                ],
                "Resource": "*"
            },
            {
                "Effect": "Allow",
                "Action": ["aoss:APIAccessAll"],
                "Resource": format!("arn:aws:aoss:{region}:*:collection/*")
            },
            {
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:ListBucket"],
                "Resource": [
                    format!("arn:aws:s3:::{bucket}"),
                    format!("arn:aws:s3:::{bucket}/*")
                ]
            }
        ]
    })
}

/// IAM client
#[derive(Clone, Debug)]
pub struct RoleAdmin {
    client: aws_sdk_iam::Client,
}

impl RoleAdmin {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(ctx.sdk_config()),
        }
    }

    /// ARN of an existing role, or `None`
    pub async fn get_role_arn(&self, name: &str) -> Result<Option<String>> {
        match self.client.get_role().role_name(name).send().await {
            Ok(out) => Ok(opt::<&Role>(out.role()).map(|r| text_or_default(r.arn()))),
            Err(e) => match from_sdk("iam", e) {
                KbError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    /// Reuse the named role, or create it with the Bedrock trust policy and
    /// the managed policy attachments
    pub async fn ensure_role(&self, name: &str, description: &str) -> Result<(String, Provisioned)> {
        if let Some(arn) = self.get_role_arn(name).await? {
            tracing::info!(%arn, "using existing IAM role");
            return Ok((arn, Provisioned::AlreadyExists));
        }

        let out = self
            .client
            .create_role()
            .role_name(name)
            .assume_role_policy_document(bedrock_trust_policy().to_string())
            .description(description)
            .send()
            .await
            .map_err(|e| from_sdk("iam", e))?;

        let arn = opt::<&Role>(out.role())
            .map(|r| text_or_default(r.arn()))
            .ok_or_else(|| KbError::Validation("create_role returned no role".to_string()))?;

        for policy_arn in MANAGED_POLICIES {
            self.client
                .attach_role_policy()
                .role_name(name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map_err(|e| from_sdk("iam", e))?;
        }

        tracing::info!(%arn, "created IAM role");
        Ok((arn, Provisioned::Created))
    }

    /// Put (create or replace) an inline policy on the role
    pub async fn put_inline_policy(&self, role: &str, policy_name: &str, document: &Value) -> Result<()> {
        self.client
            .put_role_policy()
            .role_name(role)
            .policy_name(policy_name)
            .policy_document(document.to_string())
            .send()
            .await
            .map_err(|e| from_sdk("iam", e))?;
        tracing::info!(role, policy_name, "inline policy attached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_policy() {
        let policy = bedrock_trust_policy();
        assert_eq!(policy["Version"], "2012-10-17");
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "bedrock.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }

    #[test]
    fn test_access_policy_scopes_bucket() {
        let policy = knowledge_base_access_policy("us-west-2", "bedrock-kb-133720367604");
        let statements = policy["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[1]["Resource"],
            "arn:aws:aoss:us-west-2:*:collection/*"
        );
        assert_eq!(
            statements[2]["Resource"][1],
            "arn:aws:s3:::bedrock-kb-133720367604/*"
        );
    }
}
