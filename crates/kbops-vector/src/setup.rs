//! Running setup and verification against an executor
//!
//! Author: hephaex@gmail.com

use crate::schema::{SetupStatement, VectorSchema, INTEGRATION_TABLES, ROW_COUNT, VECTOR_EXTENSION};
use kbops_core::{SqlExecutor, StatementOutcome};

/// Result of one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub description: String,
    pub sql: String,
    pub result: std::result::Result<StatementOutcome, String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of a setup run
#[derive(Debug, Clone, Default)]
pub struct SetupReport {
    pub steps: Vec<StepOutcome>,
}

impl SetupReport {
    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.succeeded()
    }

    pub fn all_ok(&self) -> bool {
        self.failed() == 0
    }
}

/// Execute every statement in order, continuing past failures
pub async fn run_setup(executor: &dyn SqlExecutor, statements: &[SetupStatement]) -> SetupReport {
    let mut report = SetupReport::default();

    for statement in statements {
        tracing::info!(backend = executor.name(), step = %statement.description, "executing");
        let result = executor.execute(&statement.sql).await.map_err(|e| {
            tracing::warn!(step = %statement.description, error = %e, "setup step failed");
            e.to_string()
        });

        report.steps.push(StepOutcome {
            description: statement.description.clone(),
            sql: statement.sql.clone(),
            result,
        });
    }

    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "setup finished"
    );
    report
}

/// Outcome of the verification queries
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub steps: Vec<StepOutcome>,
    pub vector_extension: bool,
    pub table_present: bool,
    pub row_count: Option<u64>,
}

/// Run every verification query and summarize what is in place
pub async fn run_verification(executor: &dyn SqlExecutor, schema: &VectorSchema) -> VerificationReport {
    let mut report = VerificationReport::default();
    let table = schema.qualified_table();

    for query in schema.verification_queries() {
        let result = executor.execute(&query.sql).await.map_err(|e| e.to_string());

        if let Ok(outcome) = &result {
            match query.name {
                VECTOR_EXTENSION => report.vector_extension = !outcome.rows.is_empty(),
                INTEGRATION_TABLES => {
                    report.table_present = outcome
                        .rows
                        .iter()
                        .any(|row| row.first().map(|t| t == &table).unwrap_or(false));
                }
                ROW_COUNT => report.row_count = outcome.scalar().and_then(|s| s.parse().ok()),
                _ => {}
            }
        }

        report.steps.push(StepOutcome {
            description: query.name.to_string(),
            sql: query.sql,
            result,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbops_core::{AuroraConfig, KbError, Result};
    use std::sync::Mutex;

    /// Records statements and fails those containing a marker
    struct MockExecutor {
        fail_on: Option<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    impl MockExecutor {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                fail_on,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SqlExecutor for MockExecutor {
        async fn execute(&self, sql: &str) -> Result<StatementOutcome> {
            self.seen.lock().unwrap().push(sql.to_string());
            if let Some(marker) = self.fail_on {
                if sql.contains(marker) {
                    return Err(KbError::Database(format!("failed at {marker}")));
                }
            }

            let rows = if sql.contains("extname = 'vector'") {
                vec![vec!["vector".to_string(), "0.7.0".to_string()]]
            } else if sql.contains("information_schema.tables") {
                vec![vec![
                    "bedrock_integration.bedrock_kb".to_string(),
                    "BASE TABLE".to_string(),
                ]]
            } else if sql.starts_with("SELECT COUNT(*)") {
                vec![vec!["42".to_string()]]
            } else {
                Vec::new()
            };

            Ok(StatementOutcome {
                columns: Vec::new(),
                rows,
                rows_affected: None,
            })
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn schema() -> VectorSchema {
        VectorSchema::from(&AuroraConfig::default())
    }

    #[tokio::test]
    async fn test_setup_runs_all_statements() {
        let executor = MockExecutor::new(None);
        let statements = schema().setup_statements();
        let report = run_setup(&executor, &statements).await;

        assert!(report.all_ok());
        assert_eq!(report.succeeded(), statements.len());
        assert_eq!(executor.seen.lock().unwrap().len(), statements.len());
    }

    #[tokio::test]
    async fn test_setup_continues_after_failure() {
        let executor = MockExecutor::new(Some("CREATE ROLE"));
        let statements = schema().setup_statements();
        let report = run_setup(&executor, &statements).await;

        assert_eq!(report.failed(), 1);
        assert!(!report.steps[2].is_ok());
        assert!(report.steps[3].is_ok());
        assert_eq!(executor.seen.lock().unwrap().len(), statements.len());
    }

    #[tokio::test]
    async fn test_verification_summary() {
        let executor = MockExecutor::new(None);
        let report = run_verification(&executor, &schema()).await;

        assert!(report.vector_extension);
        assert!(report.table_present);
        assert_eq!(report.row_count, Some(42));
        assert_eq!(report.steps.len(), schema().verification_queries().len());
    }

    #[test]
    fn test_verification_missing_extension() {
        let executor = MockExecutor::new(Some("extname = 'vector'"));
        let report = tokio_test::block_on(run_verification(&executor, &schema()));

        assert!(!report.vector_extension);
        assert!(report.table_present);
    }
}
