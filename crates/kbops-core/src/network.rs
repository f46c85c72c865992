//! VPC and subnet analysis
//!
//! A database cluster is only reachable from outside its VPC when an
//! instance is publicly accessible and sits in a public subnet. These
//! types describe the network a cluster lives in and classify it.
//!
//! Author: hephaex@gmail.com

use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcSummary {
    pub id: String,
    pub cidr: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSummary {
    pub id: String,
    pub availability_zone: Option<String>,
    pub cidr: Option<String>,
    /// Instances launched here get a public IP
    pub map_public_ip_on_launch: bool,
}

impl SubnetSummary {
    pub fn is_public(&self) -> bool {
        self.map_public_ip_on_launch
    }

    pub fn visibility(&self) -> &'static str {
        if self.is_public() {
            "Public"
        } else {
            "Private"
        }
    }
}

/// One VPC with its subnets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcAnalysis {
    pub vpc: VpcSummary,
    pub subnets: Vec<SubnetSummary>,
}

impl VpcAnalysis {
    pub fn public_subnets(&self) -> usize {
        self.subnets.iter().filter(|s| s.is_public()).count()
    }

    pub fn private_subnets(&self) -> usize {
        self.subnets.len() - self.public_subnets()
    }
}

/// How the cluster can be reached from this machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    /// Publicly accessible instance with a public subnet available
    Internet,
    /// Public subnets exist but no instance is publicly accessible
    PublicAccessDisabled,
    /// Every subnet is private; only in-VPC clients, the Data API or CloudShell
    VpcOnly,
}

impl Reachability {
    pub fn classify(analysis: &[VpcAnalysis], publicly_accessible: bool) -> Self {
        let public_subnet = analysis.iter().any(|a| a.public_subnets() > 0);
        match (public_subnet, publicly_accessible) {
            (true, true) => Self::Internet,
            (true, false) => Self::PublicAccessDisabled,
            (false, _) => Self::VpcOnly,
        }
    }
}

/// Source of VPC and subnet descriptions
#[async_trait::async_trait]
pub trait NetworkInspector: Send + Sync {
    /// Describe `vpc_ids`, or every VPC when empty
    async fn vpcs(&self, vpc_ids: &[String]) -> Result<Vec<VpcSummary>>;

    async fn subnets(&self, vpc_id: &str) -> Result<Vec<SubnetSummary>>;
}

/// Subnets of the given VPC, or of every non-default VPC when `vpc_id` is None
pub async fn analyze_vpcs(
    inspector: &dyn NetworkInspector,
    vpc_id: Option<&str>,
) -> Result<Vec<VpcAnalysis>> {
    let filter: Vec<String> = vpc_id.map(str::to_string).into_iter().collect();
    let vpcs = inspector.vpcs(&filter).await?;

    let mut analysis = Vec::new();
    for vpc in vpcs {
        if vpc_id.is_none() && vpc.is_default {
            continue;
        }
        let subnets = inspector.subnets(&vpc.id).await?;
        tracing::debug!(vpc = %vpc.id, subnets = subnets.len(), "vpc analyzed");
        analysis.push(VpcAnalysis { vpc, subnets });
    }
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticNetwork {
        vpcs: Vec<VpcSummary>,
        subnets: HashMap<String, Vec<SubnetSummary>>,
    }

    #[async_trait::async_trait]
    impl NetworkInspector for StaticNetwork {
        async fn vpcs(&self, vpc_ids: &[String]) -> Result<Vec<VpcSummary>> {
            Ok(self
                .vpcs
                .iter()
                .filter(|v| vpc_ids.is_empty() || vpc_ids.contains(&v.id))
                .cloned()
                .collect())
        }

        async fn subnets(&self, vpc_id: &str) -> Result<Vec<SubnetSummary>> {
            Ok(self.subnets.get(vpc_id).cloned().unwrap_or_default())
        }
    }

    fn vpc(id: &str, is_default: bool) -> VpcSummary {
        VpcSummary {
            id: id.to_string(),
            cidr: Some("10.0.0.0/16".to_string()),
            is_default,
        }
    }

    fn subnet(id: &str, public: bool) -> SubnetSummary {
        SubnetSummary {
            id: id.to_string(),
            availability_zone: Some("us-west-2a".to_string()),
            cidr: Some("10.0.1.0/24".to_string()),
            map_public_ip_on_launch: public,
        }
    }

    fn network() -> StaticNetwork {
        StaticNetwork {
            vpcs: vec![vpc("vpc-default", true), vpc("vpc-app", false)],
            subnets: HashMap::from([
                ("vpc-default".to_string(), vec![subnet("subnet-d1", true)]),
                (
                    "vpc-app".to_string(),
                    vec![subnet("subnet-a1", false), subnet("subnet-a2", false)],
                ),
            ]),
        }
    }

    #[tokio::test]
    async fn test_analyze_skips_default_vpc() {
        let analysis = analyze_vpcs(&network(), None).await.unwrap();

        assert_eq!(analysis.len(), 1);
        assert_eq!(analysis[0].vpc.id, "vpc-app");
        assert_eq!(analysis[0].private_subnets(), 2);
        assert_eq!(analysis[0].subnets[0].visibility(), "Private");
    }

    #[tokio::test]
    async fn test_analyze_named_vpc_includes_default() {
        let analysis = analyze_vpcs(&network(), Some("vpc-default")).await.unwrap();

        assert_eq!(analysis.len(), 1);
        assert_eq!(analysis[0].public_subnets(), 1);
        assert_eq!(analysis[0].subnets[0].visibility(), "Public");
    }

    #[tokio::test]
    async fn test_reachability() {
        let private = analyze_vpcs(&network(), Some("vpc-app")).await.unwrap();
        assert_eq!(Reachability::classify(&private, true), Reachability::VpcOnly);

        let public = analyze_vpcs(&network(), Some("vpc-default")).await.unwrap();
        assert_eq!(Reachability::classify(&public, true), Reachability::Internet);
        assert_eq!(
            Reachability::classify(&public, false),
            Reachability::PublicAccessDisabled
        );
        assert_eq!(Reachability::classify(&[], false), Reachability::VpcOnly);
    }
}
