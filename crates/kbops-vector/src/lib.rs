//! kbops Vector - pgvector storage for knowledge bases
//!
//! Schema statements, setup and verification runs for an Aurora PostgreSQL
//! table used as Bedrock knowledge base storage. Statements run through any
//! [`kbops_core::SqlExecutor`]: the RDS Data API or a direct sqlx pool.

pub mod schema;
pub mod setup;
pub mod store;

pub use schema::{SetupStatement, VectorSchema, VerificationQuery};
pub use setup::{run_setup, run_verification, SetupReport, StepOutcome, VerificationReport};
pub use store::PgExecutor;
