//! Aurora PostgreSQL cluster administration
//!
//! Describes the cluster, toggles public accessibility on its member
//! instances and reads connection credentials from Secrets Manager.
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, items, opt, text, text_or_default, AwsContext};
use aws_sdk_rds::types::{DbCluster, DbInstance};
use kbops_core::{DatabaseCredentials, KbError, Result};
use serde::Serialize;

/// Cluster facts printed by `db info` and used to locate the database
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub identifier: String,
    pub arn: String,
    pub status: String,
    pub engine: String,
    pub engine_version: Option<String>,
    pub endpoint: Option<String>,
    pub reader_endpoint: Option<String>,
    pub port: Option<i32>,
    pub http_endpoint_enabled: bool,
    pub security_groups: Vec<String>,
    /// DB subnet group; names the VPC the cluster lives in
    pub subnet_group: Option<String>,
    pub members: Vec<String>,
}

/// Public accessibility of one cluster member instance
#[derive(Debug, Clone, Serialize)]
pub struct InstanceAccess {
    pub identifier: String,
    pub status: String,
    pub publicly_accessible: bool,
}

#[derive(Clone, Debug)]
pub struct AuroraAdmin {
    rds: aws_sdk_rds::Client,
    secrets: aws_sdk_secretsmanager::Client,
}

impl AuroraAdmin {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            rds: aws_sdk_rds::Client::new(ctx.sdk_config()),
            secrets: aws_sdk_secretsmanager::Client::new(ctx.sdk_config()),
        }
    }

    pub async fn describe_cluster(&self, identifier: &str) -> Result<ClusterInfo> {
        let out = self
            .rds
            .describe_db_clusters()
            .db_cluster_identifier(identifier)
            .send()
            .await
            .map_err(|e| from_sdk("rds", e))?;

        items(out.db_clusters())
            .first()
            .map(convert_cluster)
            .ok_or_else(|| KbError::NotFound(format!("rds: cluster {identifier}")))
    }

    /// VPC of a DB subnet group
    pub async fn subnet_group_vpc(&self, subnet_group: &str) -> Result<Option<String>> {
        let out = self
            .rds
            .describe_db_subnet_groups()
            .db_subnet_group_name(subnet_group)
            .send()
            .await
            .map_err(|e| from_sdk("rds", e))?;

        Ok(items(out.db_subnet_groups())
            .first()
            .and_then(|group| text(group.vpc_id())))
    }

    /// Public accessibility of every member instance
    pub async fn public_access(&self, identifier: &str) -> Result<Vec<InstanceAccess>> {
        let cluster = self.describe_cluster(identifier).await?;
        let mut access = Vec::with_capacity(cluster.members.len());

        for member in &cluster.members {
            let out = self
                .rds
                .describe_db_instances()
                .db_instance_identifier(member)
                .send()
                .await
                .map_err(|e| from_sdk("rds", e))?;

            if let Some(instance) = items(out.db_instances()).first() {
                access.push(convert_instance(instance));
            }
        }
        Ok(access)
    }

    /// Enable or disable public access on every member instance
    ///
    /// Returns the instance identifiers that were modified.
    pub async fn set_public_access(&self, identifier: &str, public: bool) -> Result<Vec<String>> {
        let cluster = self.describe_cluster(identifier).await?;
        if cluster.members.is_empty() {
            return Err(KbError::NotFound(format!(
                "rds: cluster {identifier} has no member instances"
            )));
        }

        for member in &cluster.members {
            self.rds
                .modify_db_instance()
                .db_instance_identifier(member)
                .publicly_accessible(public)
                .apply_immediately(true)
                .send()
                .await
                .map_err(|e| from_sdk("rds", e))?;
            tracing::info!(instance = %member, public, "instance modification requested");
        }

        Ok(cluster.members)
    }

    /// Read connection credentials from a Secrets Manager JSON secret
    pub async fn credentials(&self, secret_arn: &str) -> Result<DatabaseCredentials> {
        let out = self
            .secrets
            .get_secret_value()
            .secret_id(secret_arn)
            .send()
            .await
            .map_err(|e| from_sdk("secretsmanager", e))?;

        let secret = text(out.secret_string())
            .ok_or_else(|| KbError::Validation(format!("secret {secret_arn} has no string value")))?;
        DatabaseCredentials::from_secret_json(&secret)
    }
}

fn convert_cluster(cluster: &DbCluster) -> ClusterInfo {
    ClusterInfo {
        identifier: text_or_default(cluster.db_cluster_identifier()),
        arn: text_or_default(cluster.db_cluster_arn()),
        status: text_or_default(cluster.status()),
        engine: text_or_default(cluster.engine()),
        engine_version: text(cluster.engine_version()),
        endpoint: text(cluster.endpoint()),
        reader_endpoint: text(cluster.reader_endpoint()),
        port: opt::<i32>(cluster.port()),
        http_endpoint_enabled: opt::<bool>(cluster.http_endpoint_enabled()).unwrap_or(false),
        security_groups: items(cluster.vpc_security_groups())
            .iter()
            .filter_map(|sg| text(sg.vpc_security_group_id()))
            .collect(),
        subnet_group: text(cluster.db_subnet_group()),
        members: items(cluster.db_cluster_members())
            .iter()
            .filter_map(|m| text(m.db_instance_identifier()))
            .collect(),
    }
}

fn convert_instance(instance: &DbInstance) -> InstanceAccess {
    InstanceAccess {
        identifier: text_or_default(instance.db_instance_identifier()),
        status: text_or_default(instance.db_instance_status()),
        publicly_accessible: opt::<bool>(instance.publicly_accessible()).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_rds::types::DbClusterMember;

    #[test]
    fn test_convert_cluster() {
        let cluster = DbCluster::builder()
            .db_cluster_identifier("my-aurora-serverless")
            .db_cluster_arn("arn:aws:rds:us-west-2:133720367604:cluster:my-aurora-serverless")
            .status("available")
            .engine("aurora-postgresql")
            .endpoint("my-aurora-serverless.cluster-cu2bffdza994.us-west-2.rds.amazonaws.com")
            .port(5432)
            .http_endpoint_enabled(true)
            .db_subnet_group("aurora-private-subnets")
            .db_cluster_members(
                DbClusterMember::builder()
                    .db_instance_identifier("my-aurora-serverless-instance-1")
                    .build(),
            )
            .build();

        let info = convert_cluster(&cluster);
        assert_eq!(info.identifier, "my-aurora-serverless");
        assert_eq!(info.engine, "aurora-postgresql");
        assert_eq!(info.port, Some(5432));
        assert!(info.http_endpoint_enabled);
        assert_eq!(info.members, vec!["my-aurora-serverless-instance-1"]);
        assert!(info.reader_endpoint.is_none());
        assert_eq!(info.subnet_group.as_deref(), Some("aurora-private-subnets"));
    }
}
