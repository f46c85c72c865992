//! SQL over the RDS Data API
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, items, opt, text, AwsContext};
use async_trait::async_trait;
use aws_sdk_rdsdata::types::Field;
use kbops_core::{Result, SqlExecutor, StatementOutcome};

/// Runs statements through `ExecuteStatement` without a network path to
/// the database
#[derive(Clone, Debug)]
pub struct DataApiExecutor {
    client: aws_sdk_rdsdata::Client,
    cluster_arn: String,
    secret_arn: String,
    database: String,
}

impl DataApiExecutor {
    pub fn new(
        ctx: &AwsContext,
        cluster_arn: impl Into<String>,
        secret_arn: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            client: aws_sdk_rdsdata::Client::new(ctx.sdk_config()),
            cluster_arn: cluster_arn.into(),
            secret_arn: secret_arn.into(),
            database: database.into(),
        }
    }
}

#[async_trait]
impl SqlExecutor for DataApiExecutor {
    async fn execute(&self, sql: &str) -> Result<StatementOutcome> {
        let out = self
            .client
            .execute_statement()
            .resource_arn(&self.cluster_arn)
            .secret_arn(&self.secret_arn)
            .database(&self.database)
            .sql(sql)
            .include_result_metadata(true)
            .send()
            .await
            .map_err(|e| from_sdk("rds-data", e))?;

        let columns = items(out.column_metadata())
            .iter()
            .map(|c| text(c.name()).unwrap_or_default())
            .collect();

        let rows = items(out.records())
            .iter()
            .map(|record| record.iter().map(render_field).collect())
            .collect();

        Ok(StatementOutcome {
            columns,
            rows,
            rows_affected: opt::<i64>(out.number_of_records_updated())
                .and_then(|n| u64::try_from(n).ok()),
        })
    }

    fn name(&self) -> &str {
        "rds-data-api"
    }
}

/// Render a Data API field as display text
pub(crate) fn render_field(field: &Field) -> String {
    match field {
        Field::StringValue(s) => s.clone(),
        Field::LongValue(v) => v.to_string(),
        Field::DoubleValue(v) => v.to_string(),
        Field::BooleanValue(v) => v.to_string(),
        Field::IsNull(_) => "NULL".to_string(),
        Field::BlobValue(b) => format!("<{} bytes>", b.as_ref().len()),
        Field::ArrayValue(v) => format!("{v:?}"),
        _ => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_field() {
        assert_eq!(render_field(&Field::StringValue("vector".into())), "vector");
        assert_eq!(render_field(&Field::LongValue(1536)), "1536");
        assert_eq!(render_field(&Field::BooleanValue(true)), "true");
        assert_eq!(render_field(&Field::IsNull(true)), "NULL");
    }
}
