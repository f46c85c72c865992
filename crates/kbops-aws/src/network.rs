//! EC2 VPC and subnet descriptions
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, items, opt, text, text_or_default, AwsContext};
use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, Subnet, Vpc};
use kbops_core::{NetworkInspector, Result, SubnetSummary, VpcSummary};

#[derive(Clone, Debug)]
pub struct Ec2Network {
    client: aws_sdk_ec2::Client,
}

impl Ec2Network {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(ctx.sdk_config()),
        }
    }
}

#[async_trait]
impl NetworkInspector for Ec2Network {
    async fn vpcs(&self, vpc_ids: &[String]) -> Result<Vec<VpcSummary>> {
        let mut request = self.client.describe_vpcs();
        for id in vpc_ids {
            request = request.vpc_ids(id);
        }

        let out = request.send().await.map_err(|e| from_sdk("ec2", e))?;
        Ok(items(out.vpcs()).iter().map(convert_vpc).collect())
    }

    async fn subnets(&self, vpc_id: &str) -> Result<Vec<SubnetSummary>> {
        let out = self
            .client
            .describe_subnets()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .send()
            .await
            .map_err(|e| from_sdk("ec2", e))?;

        Ok(items(out.subnets()).iter().map(convert_subnet).collect())
    }
}

fn convert_vpc(vpc: &Vpc) -> VpcSummary {
    VpcSummary {
        id: text_or_default(vpc.vpc_id()),
        cidr: text(vpc.cidr_block()),
        is_default: opt::<bool>(vpc.is_default()).unwrap_or(false),
    }
}

fn convert_subnet(subnet: &Subnet) -> SubnetSummary {
    SubnetSummary {
        id: text_or_default(subnet.subnet_id()),
        availability_zone: text(subnet.availability_zone()),
        cidr: text(subnet.cidr_block()),
        map_public_ip_on_launch: opt::<bool>(subnet.map_public_ip_on_launch()).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_subnet() {
        let subnet = Subnet::builder()
            .subnet_id("subnet-0abc")
            .availability_zone("us-west-2b")
            .cidr_block("172.31.16.0/20")
            .map_public_ip_on_launch(true)
            .build();

        let summary = convert_subnet(&subnet);
        assert_eq!(summary.id, "subnet-0abc");
        assert_eq!(summary.availability_zone.as_deref(), Some("us-west-2b"));
        assert!(summary.is_public());

        let private = convert_subnet(&Subnet::builder().subnet_id("subnet-0def").build());
        assert!(!private.is_public());
        assert!(private.cidr.is_none());
    }

    #[test]
    fn test_convert_vpc() {
        let vpc = Vpc::builder()
            .vpc_id("vpc-0123")
            .cidr_block("10.0.0.0/16")
            .is_default(false)
            .build();

        let summary = convert_vpc(&vpc);
        assert_eq!(summary.id, "vpc-0123");
        assert_eq!(summary.cidr.as_deref(), Some("10.0.0.0/16"));
        assert!(!summary.is_default);
    }
}
