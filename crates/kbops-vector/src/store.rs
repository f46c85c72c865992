//! Direct PostgreSQL connection
//!
//! Runs statements over a sqlx pool when the cluster is reachable from this
//! machine (public access enabled, or from inside the VPC).
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use kbops_core::{DatabaseCredentials, KbError, Result, SqlExecutor, StatementOutcome};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Duration;

/// sqlx-backed statement executor
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect with a `postgres://` URL
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| KbError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Connect with credentials read from Secrets Manager
    pub async fn connect_with(credentials: &DatabaseCredentials) -> Result<Self> {
        let host = credentials
            .host
            .as_deref()
            .ok_or_else(|| KbError::Validation("database host is not known".to_string()))?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(credentials.port)
            .database(&credentials.database)
            .username(&credentials.username)
            .ssl_mode(PgSslMode::Prefer);
        if let Some(password) = &credentials.password {
            options = options.password(password);
        }

        tracing::info!(host, port = credentials.port, database = %credentials.database, "connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| KbError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<StatementOutcome> {
        if returns_rows(sql) {
            let rows = sqlx::raw_sql(sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| KbError::Database(e.to_string()))?;

            let columns = rows
                .first()
                .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();

            Ok(StatementOutcome {
                columns,
                rows: rows.iter().map(render_row).collect(),
                rows_affected: None,
            })
        } else {
            let done = sqlx::raw_sql(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| KbError::Database(e.to_string()))?;

            Ok(StatementOutcome {
                rows_affected: Some(done.rows_affected()),
                ..Default::default()
            })
        }
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_uppercase();
    ["SELECT", "SHOW", "WITH", "VALUES", "TABLE"]
        .iter()
        .any(|kw| head.starts_with(kw))
}

fn render_row(row: &PgRow) -> Vec<String> {
    (0..row.columns().len()).map(|i| render_value(row, i)).collect()
}

/// Render one column as text, whatever its PostgreSQL type
fn render_value(row: &PgRow, index: usize) -> String {
    let type_name = match row.try_get_raw(index) {
        Ok(value) if value.is_null() => return "NULL".to_string(),
        Ok(value) => value.type_info().name().to_string(),
        Err(e) => return format!("<{e}>"),
    };

    let rendered = match type_name.as_str() {
        "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" | "CHAR" => row.try_get::<String, _>(index).ok(),
        "BOOL" => row.try_get::<bool, _>(index).ok().map(|v| v.to_string()),
        "INT2" => row.try_get::<i16, _>(index).ok().map(|v| v.to_string()),
        "INT4" => row.try_get::<i32, _>(index).ok().map(|v| v.to_string()),
        "INT8" => row.try_get::<i64, _>(index).ok().map(|v| v.to_string()),
        "FLOAT4" => row.try_get::<f32, _>(index).ok().map(|v| v.to_string()),
        "FLOAT8" => row.try_get::<f64, _>(index).ok().map(|v| v.to_string()),
        "UUID" => row.try_get::<uuid::Uuid, _>(index).ok().map(|v| v.to_string()),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(index)
            .ok()
            .map(|v| v.to_string()),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(index)
            .ok()
            .map(|v| v.0.to_string()),
        "TEXT[]" | "NAME[]" | "VARCHAR[]" => row
            .try_get::<Vec<String>, _>(index)
            .ok()
            .map(|v| v.join(",")),
        _ => None,
    };

    rendered.unwrap_or_else(|| format!("<{type_name}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT version();"));
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("SHOW shared_preload_libraries;"));
        assert!(!returns_rows("CREATE EXTENSION IF NOT EXISTS vector;"));
        assert!(!returns_rows("DO $$ BEGIN CREATE ROLE x LOGIN; END $$;"));
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_select_version() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let executor = PgExecutor::connect(&url).await.unwrap();
        let outcome = executor.execute("SELECT version();").await.unwrap();
        assert!(outcome.scalar().unwrap().contains("PostgreSQL"));
    }
}
