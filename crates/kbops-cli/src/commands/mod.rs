//! Subcommand implementations
//!
//! Each module covers one family of operations and prints human-readable,
//! emoji-prefixed progress to stdout. Failures are returned as errors and
//! reported once by `main`.
//!
//! Author: hephaex@gmail.com

pub mod chat;
pub mod check;
pub mod collection;
pub mod db;
pub mod guide;
pub mod ingest;
pub mod kb;
pub mod models;

use kbops_aws::AwsContext;
use kbops_core::AppConfig;

/// AWS clients for the configured region and profile
pub async fn aws(config: &AppConfig) -> AwsContext {
    AwsContext::load(&config.aws).await
}

/// A setting the command cannot run without
pub fn required<'a>(value: Option<&'a str>, env: &str) -> anyhow::Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{env} is not set (environment or config file)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert_eq!(required(Some("arn:aws:rds:x"), "AURORA_CLUSTER_ARN").unwrap(), "arn:aws:rds:x");
        let err = required(None, "AURORA_SECRET_ARN").unwrap_err();
        assert!(err.to_string().contains("AURORA_SECRET_ARN"));
        assert!(required(Some("  "), "KB_ID").is_err());
    }
}
