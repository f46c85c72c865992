//! Records persisted or exchanged with the platform
//!
//! Author: hephaex@gmail.com

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{KbError, Result};

/// IDs produced by a successful knowledge base creation, written as
/// `knowledge_base_info.json` for later commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub ingestion_job_id: Option<String>,
    pub collection_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub account_id: String,
    pub region: String,
}

impl ResourceRecord {
    /// Write the record as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a record written by [`ResourceRecord::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Database connection parameters resolved from a Secrets Manager secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    pub host: Option<String>,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Secret JSON as stored by RDS-managed secrets
#[derive(Debug, Deserialize)]
struct SecretPayload {
    username: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<serde_json::Value>,
    db: Option<String>,
    dbname: Option<String>,
}

impl DatabaseCredentials {
    /// Parse a secret string, defaulting to `myapp` / `dbadmin` / 5432
    pub fn from_secret_json(secret: &str) -> Result<Self> {
        let payload: SecretPayload = serde_json::from_str(secret)
            .map_err(|e| KbError::Validation(format!("secret is not valid JSON: {e}")))?;

        // RDS stores the port as a number; hand-written secrets often use a string
        let port = match payload.port {
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| KbError::Validation(format!("invalid port {n}")))?,
            Some(serde_json::Value::String(s)) => s
                .parse()
                .map_err(|_| KbError::Validation(format!("invalid port {s}")))?,
            _ => 5432,
        };

        Ok(Self {
            host: payload.host,
            port,
            database: payload
                .db
                .or(payload.dbname)
                .unwrap_or_else(|| "myapp".to_string()),
            username: payload.username.unwrap_or_else(|| "dbadmin".to_string()),
            password: payload.password,
        })
    }

    /// Replace the host when the secret does not carry one
    pub fn with_default_host(mut self, host: Option<String>) -> Self {
        if self.host.is_none() {
            self.host = host;
        }
        self
    }

    /// `psql` invocation for manual connection
    pub fn psql_command(&self) -> String {
        format!(
            "psql -h {} -p {} -U {} -d {}",
            self.host.as_deref().unwrap_or("<cluster-endpoint>"),
            self.port,
            self.username,
            self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_full_secret() {
        let creds = DatabaseCredentials::from_secret_json(
            r#"{"username":"admin","password":"s3cret","host":"db.example.com","port":5433,"dbname":"kb"}"#,
        )
        .unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password.as_deref(), Some("s3cret"));
        assert_eq!(creds.host.as_deref(), Some("db.example.com"));
        assert_eq!(creds.port, 5433);
        assert_eq!(creds.database, "kb");
    }

    #[test]
    fn test_credentials_defaults() {
        let creds = DatabaseCredentials::from_secret_json(r#"{"password":"x"}"#).unwrap();
        assert_eq!(creds.username, "dbadmin");
        assert_eq!(creds.database, "myapp");
        assert_eq!(creds.port, 5432);
        assert!(creds.host.is_none());
    }

    #[test]
    fn test_credentials_string_port_and_db_key() {
        let creds =
            DatabaseCredentials::from_secret_json(r#"{"port":"6543","db":"a","dbname":"b"}"#)
                .unwrap();
        assert_eq!(creds.port, 6543);
        assert_eq!(creds.database, "a");
    }

    #[test]
    fn test_credentials_invalid() {
        assert!(DatabaseCredentials::from_secret_json("not json").is_err());
        assert!(DatabaseCredentials::from_secret_json(r#"{"port":"abc"}"#).is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let creds = DatabaseCredentials::from_secret_json(r#"{"password":"hunter2"}"#).unwrap();
        let json = serde_json::to_string(&creds).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_psql_command() {
        let creds = DatabaseCredentials::from_secret_json("{}")
            .unwrap()
            .with_default_host(Some("cluster.rds.amazonaws.com".into()));
        assert_eq!(
            creds.psql_command(),
            "psql -h cluster.rds.amazonaws.com -p 5432 -U dbadmin -d myapp"
        );
    }

    #[test]
    fn test_resource_record_round_trip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge_base_info.json");
        let record = ResourceRecord {
            knowledge_base_id: "KB123".into(),
            data_source_id: "DS456".into(),
            ingestion_job_id: Some("JOB789".into()),
            collection_id: None,
            created_at: Utc::now(),
            account_id: "133720367604".into(),
            region: "us-west-2".into(),
        };
        record.save(&path).unwrap();
        assert_eq!(ResourceRecord::load(&path).unwrap(), record);
    }
}
