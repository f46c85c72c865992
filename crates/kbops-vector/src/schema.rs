//! pgvector schema for the knowledge base table
//!
//! Renders the idempotent setup statements and the read-only verification
//! queries for an Aurora PostgreSQL knowledge base store.
//!
//! Author: hephaex@gmail.com

use kbops_core::{AuroraConfig, KbError, Result};
use serde::Serialize;

/// One setup statement with a human-readable description
#[derive(Debug, Clone, Serialize)]
pub struct SetupStatement {
    pub description: String,
    pub sql: String,
}

/// One read-only verification query
#[derive(Debug, Clone, Serialize)]
pub struct VerificationQuery {
    pub name: &'static str,
    pub sql: String,
}

/// Layout of the vector table used as Bedrock RDS storage
#[derive(Debug, Clone)]
pub struct VectorSchema {
    pub schema: String,
    pub table: String,
    pub dimension: usize,
    pub role: String,
    pub role_password: Option<String>,
}

impl From<&AuroraConfig> for VectorSchema {
    fn from(config: &AuroraConfig) -> Self {
        Self {
            schema: config.schema.clone(),
            table: config.table.clone(),
            dimension: config.dimension,
            role: config.role.clone(),
            role_password: config.role_password.clone(),
        }
    }
}

impl VectorSchema {
    /// Reject identifiers that would need quoting
    pub fn validate(&self) -> Result<()> {
        for (what, ident) in [
            ("schema", &self.schema),
            ("table", &self.table),
            ("role", &self.role),
        ] {
            if !is_plain_identifier(ident) {
                return Err(KbError::Validation(format!("invalid {what} name: {ident:?}")));
            }
        }
        if self.dimension == 0 || self.dimension > 16_000 {
            return Err(KbError::Validation(format!(
                "invalid vector dimension: {}",
                self.dimension
            )));
        }
        Ok(())
    }

    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Ordered setup statements; every one is safe to re-run
    pub fn setup_statements(&self) -> Vec<SetupStatement> {
        let table = self.qualified_table();
        let mut statements = vec![
            step("Enable the vector extension", "CREATE EXTENSION IF NOT EXISTS vector;".to_string()),
            step(
                &format!("Create {} schema", self.schema),
                format!("CREATE SCHEMA IF NOT EXISTS {};", self.schema),
            ),
            step(
                &format!("Create {} role", self.role),
                format!(
                    "DO $$ BEGIN CREATE ROLE {role} LOGIN; \
                     EXCEPTION WHEN duplicate_object THEN RAISE NOTICE 'Role {role} already exists'; \
                     END $$;",
                    role = self.role
                ),
            ),
        ];

        if let Some(password) = &self.role_password {
            statements.push(step(
                &format!("Set password for {}", self.role),
                format!(
                    "ALTER ROLE {} PASSWORD '{}';",
                    self.role,
                    password.replace('\'', "''")
                ),
            ));
        }

        statements.extend([
            step(
                "Grant permissions on schema",
                format!("GRANT ALL ON SCHEMA {} TO {};", self.schema, self.role),
            ),
            step(
                "Create the vector table",
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (\n    \
                     id uuid PRIMARY KEY DEFAULT gen_random_uuid(),\n    \
                     embedding vector({}),\n    \
                     chunks text,\n    \
                     metadata json\n);",
                    self.dimension
                ),
            ),
            step(
                "Create HNSW index for similarity search",
                format!(
                    "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {table} USING hnsw (embedding vector_cosine_ops);",
                    self.table
                ),
            ),
            step(
                "Grant permissions on table",
                format!("GRANT ALL ON TABLE {table} TO {};", self.role),
            ),
            // json has no GIN operator class, so index the jsonb cast
            step(
                "Create metadata index",
                format!(
                    "CREATE INDEX IF NOT EXISTS {}_metadata_idx ON {table} USING gin ((metadata::jsonb));",
                    self.table
                ),
            ),
        ]);

        statements
    }

    /// Read-only checks, in display order
    pub fn verification_queries(&self) -> Vec<VerificationQuery> {
        vec![
            VerificationQuery {
                name: "Database version",
                sql: "SELECT version();".to_string(),
            },
            VerificationQuery {
                name: "Installed extensions",
                sql: "SELECT extname, extversion FROM pg_extension ORDER BY extname;".to_string(),
            },
            VerificationQuery {
                name: VECTOR_EXTENSION,
                sql: "SELECT extname, extversion FROM pg_extension WHERE extname = 'vector';"
                    .to_string(),
            },
            VerificationQuery {
                name: "Available vector extension",
                sql: "SELECT name, default_version, installed_version FROM pg_available_extensions WHERE name = 'vector';"
                    .to_string(),
            },
            VerificationQuery {
                name: "Schemas",
                sql: "SELECT schema_name FROM information_schema.schemata \
                      WHERE schema_name NOT IN ('information_schema', 'pg_catalog', 'pg_toast') \
                      ORDER BY schema_name;"
                    .to_string(),
            },
            VerificationQuery {
                name: INTEGRATION_TABLES,
                sql: format!(
                    "SELECT table_schema || '.' || table_name AS show_tables, table_type \
                     FROM information_schema.tables \
                     WHERE table_type = 'BASE TABLE' AND table_schema = '{}';",
                    self.schema
                ),
            },
            VerificationQuery {
                name: "Table columns",
                sql: format!(
                    "SELECT column_name, data_type, is_nullable, column_default \
                     FROM information_schema.columns \
                     WHERE table_schema = '{}' AND table_name = '{}' \
                     ORDER BY ordinal_position;",
                    self.schema, self.table
                ),
            },
            VerificationQuery {
                name: "Table indexes",
                sql: format!(
                    "SELECT indexname, indexdef FROM pg_indexes \
                     WHERE schemaname = '{}' AND tablename = '{}';",
                    self.schema, self.table
                ),
            },
            VerificationQuery {
                name: ROW_COUNT,
                sql: format!("SELECT COUNT(*) FROM {};", self.qualified_table()),
            },
            VerificationQuery {
                name: "Database size",
                sql: "SELECT current_database(), pg_size_pretty(pg_database_size(current_database()));"
                    .to_string(),
            },
        ]
    }

    /// The annotated `setup_vector_database.sql` script for manual runs
    pub fn render_script(&self) -> String {
        let mut out = String::new();
        out.push_str("-- Vector storage setup for a Bedrock knowledge base\n");
        out.push_str("-- Run as the cluster master user (psql, Query Editor or CloudShell)\n\n");

        for statement in self.setup_statements() {
            out.push_str(&format!("-- {}\n{}\n\n", statement.description, statement.sql));
        }

        if self.role_password.is_none() {
            out.push_str(&format!(
                "-- Set a password for {} before using it from Bedrock:\n-- ALTER ROLE {} PASSWORD '<password>';\n\n",
                self.role, self.role
            ));
        }

        out.push_str("-- Verification\n");
        for query in self.verification_queries() {
            out.push_str(&format!("-- {}\n{}\n\n", query.name, query.sql));
        }

        out.push_str(&format!(
            "-- Optional vector smoke test\n\
             -- INSERT INTO {} (embedding, chunks, metadata)\n\
             -- VALUES (array_fill(0.1, ARRAY[{}])::vector, 'test chunk', '{{\"source\": \"test\"}}'::json);\n",
            self.qualified_table(),
            self.dimension
        ));
        out
    }
}

pub(crate) const VECTOR_EXTENSION: &str = "Vector extension";
pub(crate) const INTEGRATION_TABLES: &str = "Integration tables";
pub(crate) const ROW_COUNT: &str = "Row count";

fn step(description: &str, sql: String) -> SetupStatement {
    SetupStatement {
        description: description.to_string(),
        sql,
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    ident.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> VectorSchema {
        VectorSchema::from(&AuroraConfig::default())
    }

    #[test]
    fn test_statement_order() {
        let statements = schema().setup_statements();
        let sql: Vec<&str> = statements.iter().map(|s| s.sql.as_str()).collect();

        assert!(sql[0].starts_with("CREATE EXTENSION IF NOT EXISTS vector"));
        assert!(sql[1].starts_with("CREATE SCHEMA IF NOT EXISTS bedrock_integration"));
        assert!(sql[2].contains("CREATE ROLE bedrock_user LOGIN"));
        assert!(sql[2].contains("duplicate_object"));
        assert!(sql[3].starts_with("GRANT ALL ON SCHEMA bedrock_integration TO bedrock_user"));
        assert!(sql[4].starts_with("CREATE TABLE IF NOT EXISTS bedrock_integration.bedrock_kb"));
        assert!(sql[4].contains("embedding vector(1536)"));
        assert!(sql[4].contains("gen_random_uuid()"));
        assert!(sql[5].contains("USING hnsw (embedding vector_cosine_ops)"));
        assert!(sql[6].starts_with("GRANT ALL ON TABLE"));
        assert!(sql[7].contains("USING gin ((metadata::jsonb))"));
        assert_eq!(sql.len(), 8);
    }

    #[test]
    fn test_statements_are_idempotent() {
        for statement in schema().setup_statements() {
            let sql = statement.sql.as_str();
            if sql.starts_with("CREATE") {
                assert!(sql.contains("IF NOT EXISTS"), "{sql}");
            }
        }
    }

    #[test]
    fn test_password_statement_escaped() {
        let mut s = schema();
        s.role_password = Some("it's-secret".to_string());
        let statements = s.setup_statements();

        assert_eq!(statements.len(), 9);
        assert_eq!(
            statements[3].sql,
            "ALTER ROLE bedrock_user PASSWORD 'it''s-secret';"
        );
    }

    #[test]
    fn test_validate_identifiers() {
        assert!(schema().validate().is_ok());

        let mut bad = schema();
        bad.table = "bedrock_kb; DROP TABLE x".to_string();
        assert!(bad.validate().is_err());

        let mut bad = schema();
        bad.dimension = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_render_script() {
        let script = schema().render_script();
        assert!(script.contains("-- Enable the vector extension\nCREATE EXTENSION IF NOT EXISTS vector;"));
        assert!(script.contains("ALTER ROLE bedrock_user PASSWORD '<password>'"));
        assert!(script.contains("SELECT COUNT(*) FROM bedrock_integration.bedrock_kb;"));
    }

    #[test]
    fn test_verification_queries() {
        let queries = schema().verification_queries();
        assert_eq!(queries.len(), 10);
        assert!(queries.iter().any(|q| q.name == VECTOR_EXTENSION));
        assert!(queries
            .iter()
            .all(|q| q.sql.trim_start().to_uppercase().starts_with("SELECT")));
    }
}
