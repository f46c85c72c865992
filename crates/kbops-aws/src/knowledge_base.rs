//! Knowledge base administration via the Bedrock agent API
//!
//! Covers listing and inspecting knowledge bases, creating a knowledge
//! base backed by OpenSearch Serverless or Aurora PostgreSQL, attaching an
//! S3 data source, and starting / watching ingestion jobs.
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, invalid, items, opt, text, text_or_default, to_utc, AwsContext};
use aws_sdk_bedrockagent::primitives::DateTime as SdkDateTime;
use aws_sdk_bedrockagent::types::{
    DataSourceConfiguration, DataSourceStatus, DataSourceType, IngestionJobStatus,
    KnowledgeBaseConfiguration, KnowledgeBaseStatus, KnowledgeBaseStorageType, KnowledgeBaseType,
    OpenSearchServerlessConfiguration, OpenSearchServerlessFieldMapping, RdsConfiguration,
    RdsFieldMapping, S3DataSourceConfiguration, StorageConfiguration,
    VectorKnowledgeBaseConfiguration,
};
use kbops_core::{
    poll_until, DataSourceSummary, IngestionJob, IngestionStatus, KbError, KnowledgeBaseDetail,
    KnowledgeBaseSummary, PollingConfig, Result,
};

/// Vector store settings for a new knowledge base
#[derive(Debug, Clone)]
pub enum VectorStorage {
    OpenSearch {
        collection_arn: String,
        vector_index: String,
        vector_field: String,
        text_field: String,
        metadata_field: String,
    },
    Aurora {
        cluster_arn: String,
        secret_arn: String,
        database: String,
        table: String,
    },
}

/// Parameters for [`KnowledgeBaseAdmin::create_knowledge_base`]
#[derive(Debug, Clone)]
pub struct CreateKnowledgeBase {
    pub name: String,
    pub description: String,
    pub role_arn: String,
    pub embedding_model_arn: String,
    pub storage: VectorStorage,
}

/// Bedrock agent (control plane) client
#[derive(Clone, Debug)]
pub struct KnowledgeBaseAdmin {
    client: aws_sdk_bedrockagent::Client,
}

impl KnowledgeBaseAdmin {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_bedrockagent::Client::new(ctx.sdk_config()),
        }
    }

    /// List knowledge bases in the region
    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBaseSummary>> {
        let out = self
            .client
            .list_knowledge_bases()
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        Ok(items(out.knowledge_base_summaries())
            .iter()
            .map(|kb| KnowledgeBaseSummary {
                id: text_or_default(kb.knowledge_base_id()),
                name: text_or_default(kb.name()),
                description: text(kb.description()),
                status: kb_status(kb.status()),
                updated_at: opt::<&SdkDateTime>(kb.updated_at()).and_then(to_utc),
            })
            .collect())
    }

    /// Describe one knowledge base
    pub async fn get_knowledge_base(&self, kb_id: &str) -> Result<KnowledgeBaseDetail> {
        let out = self
            .client
            .get_knowledge_base()
            .knowledge_base_id(kb_id)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        let kb = opt::<&aws_sdk_bedrockagent::types::KnowledgeBase>(out.knowledge_base())
            .ok_or_else(|| KbError::NotFound(format!("knowledge base {kb_id}")))?;

        Ok(KnowledgeBaseDetail {
            id: text_or_default(kb.knowledge_base_id()),
            name: text_or_default(kb.name()),
            arn: text_or_default(kb.knowledge_base_arn()),
            description: text(kb.description()),
            status: kb_status(kb.status()),
            created_at: opt::<&SdkDateTime>(kb.created_at()).and_then(to_utc),
            updated_at: opt::<&SdkDateTime>(kb.updated_at()).and_then(to_utc),
            failure_reasons: items(kb.failure_reasons()).to_vec(),
        })
    }

    /// List the data sources of a knowledge base
    pub async fn list_data_sources(&self, kb_id: &str) -> Result<Vec<DataSourceSummary>> {
        let out = self
            .client
            .list_data_sources()
            .knowledge_base_id(kb_id)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        Ok(items(out.data_source_summaries())
            .iter()
            .map(|ds| DataSourceSummary {
                id: text_or_default(ds.data_source_id()),
                name: text_or_default(ds.name()),
                description: text(ds.description()),
                status: opt::<&DataSourceStatus>(ds.status())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// List ingestion jobs of a data source
    pub async fn list_ingestion_jobs(
        &self,
        kb_id: &str,
        data_source_id: &str,
    ) -> Result<Vec<IngestionJob>> {
        let out = self
            .client
            .list_ingestion_jobs()
            .knowledge_base_id(kb_id)
            .data_source_id(data_source_id)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        Ok(items(out.ingestion_job_summaries())
            .iter()
            .map(|job| IngestionJob {
                id: text_or_default(job.ingestion_job_id()),
                status: job_status(job.status()),
                started_at: opt::<&SdkDateTime>(job.started_at()).and_then(to_utc),
                updated_at: opt::<&SdkDateTime>(job.updated_at()).and_then(to_utc),
                failure_reasons: Vec::new(),
            })
            .collect())
    }

    /// Fetch one ingestion job, including failure reasons
    pub async fn get_ingestion_job(
        &self,
        kb_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> Result<IngestionJob> {
        let out = self
            .client
            .get_ingestion_job()
            .knowledge_base_id(kb_id)
            .data_source_id(data_source_id)
            .ingestion_job_id(job_id)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        let job = opt::<&aws_sdk_bedrockagent::types::IngestionJob>(out.ingestion_job())
            .ok_or_else(|| KbError::NotFound(format!("ingestion job {job_id}")))?;
        Ok(convert_job(job))
    }

    /// Start a new ingestion job
    pub async fn start_ingestion_job(
        &self,
        kb_id: &str,
        data_source_id: &str,
        description: Option<&str>,
    ) -> Result<IngestionJob> {
        let mut request = self
            .client
            .start_ingestion_job()
            .knowledge_base_id(kb_id)
            .data_source_id(data_source_id);
        if let Some(d) = description {
            request = request.description(d);
        }

        let out = request
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        let job = opt::<&aws_sdk_bedrockagent::types::IngestionJob>(out.ingestion_job())
            .ok_or_else(|| KbError::Validation("start_ingestion_job returned no job".to_string()))?;

        tracing::info!(kb_id, data_source_id, job_id = %text_or_default(job.ingestion_job_id()), "ingestion started");
        Ok(convert_job(job))
    }

    /// Poll an ingestion job until it is complete, failed or stopped
    pub async fn wait_for_ingestion(
        &self,
        kb_id: &str,
        data_source_id: &str,
        job_id: &str,
        polling: &PollingConfig,
    ) -> Result<IngestionJob> {
        poll_until(
            "ingestion job",
            polling.interval(),
            polling.max_attempts,
            || async {
                let job = self.get_ingestion_job(kb_id, data_source_id, job_id).await?;
                tracing::info!(job_id, status = %job.status, "ingestion status");
                Ok(job)
            },
            |job| job.status.is_terminal(),
        )
        .await
    }

    /// Create a vector knowledge base
    pub async fn create_knowledge_base(&self, req: &CreateKnowledgeBase) -> Result<KnowledgeBaseDetail> {
        let kb_config = KnowledgeBaseConfiguration::builder()
            .r#type(KnowledgeBaseType::Vector)
            .vector_knowledge_base_configuration(
                VectorKnowledgeBaseConfiguration::builder()
                    .embedding_model_arn(&req.embedding_model_arn)
                    .build()
                    .map_err(invalid)?,
            )
            .build()
            .map_err(invalid)?;

        let storage = storage_configuration(&req.storage)?;

        let out = self
            .client
            .create_knowledge_base()
            .name(&req.name)
            .description(&req.description)
            .role_arn(&req.role_arn)
            .knowledge_base_configuration(kb_config)
            .storage_configuration(storage)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        let kb = opt::<&aws_sdk_bedrockagent::types::KnowledgeBase>(out.knowledge_base())
            .ok_or_else(|| KbError::Validation("create_knowledge_base returned nothing".to_string()))?;

        tracing::info!(kb_id = %text_or_default(kb.knowledge_base_id()), "knowledge base created");

        Ok(KnowledgeBaseDetail {
            id: text_or_default(kb.knowledge_base_id()),
            name: text_or_default(kb.name()),
            arn: text_or_default(kb.knowledge_base_arn()),
            description: text(kb.description()),
            status: kb_status(kb.status()),
            created_at: opt::<&SdkDateTime>(kb.created_at()).and_then(to_utc),
            updated_at: opt::<&SdkDateTime>(kb.updated_at()).and_then(to_utc),
            failure_reasons: items(kb.failure_reasons()).to_vec(),
        })
    }

    /// Attach an S3 prefix as a data source; returns the data source ID
    pub async fn create_s3_data_source(
        &self,
        kb_id: &str,
        name: &str,
        bucket_arn: &str,
        prefix: &str,
    ) -> Result<String> {
        let s3 = S3DataSourceConfiguration::builder()
            .bucket_arn(bucket_arn)
            .inclusion_prefixes(prefix)
            .build()
            .map_err(invalid)?;

        let config = DataSourceConfiguration::builder()
            .r#type(DataSourceType::S3)
            .s3_configuration(s3)
            .build()
            .map_err(invalid)?;

        let out = self
            .client
            .create_data_source()
            .knowledge_base_id(kb_id)
            .name(name)
            .description("S3 data source for heavy machinery PDFs")
            .data_source_configuration(config)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent", e))?;

        let ds = opt::<&aws_sdk_bedrockagent::types::DataSource>(out.data_source())
            .ok_or_else(|| KbError::Validation("create_data_source returned nothing".to_string()))?;
        Ok(text_or_default(ds.data_source_id()))
    }
}

fn storage_configuration(storage: &VectorStorage) -> Result<StorageConfiguration> {
    let config = match storage {
        VectorStorage::OpenSearch {
            collection_arn,
            vector_index,
            vector_field,
            text_field,
            metadata_field,
        } => {
            let mapping = OpenSearchServerlessFieldMapping::builder()
                .vector_field(vector_field)
                .text_field(text_field)
                .metadata_field(metadata_field)
                .build()
                .map_err(invalid)?;

            StorageConfiguration::builder()
                .r#type(KnowledgeBaseStorageType::OpensearchServerless)
                .opensearch_serverless_configuration(
                    OpenSearchServerlessConfiguration::builder()
                        .collection_arn(collection_arn)
                        .vector_index_name(vector_index)
                        .field_mapping(mapping)
                        .build()
                        .map_err(invalid)?,
                )
                .build()
                .map_err(invalid)?
        }
        VectorStorage::Aurora {
            cluster_arn,
            secret_arn,
            database,
            table,
        } => {
            // Column names match the table created by kbops-vector
            let mapping = RdsFieldMapping::builder()
                .primary_key_field("id")
                .vector_field("embedding")
                .text_field("chunks")
                .metadata_field("metadata")
                .build()
                .map_err(invalid)?;

            StorageConfiguration::builder()
                .r#type(KnowledgeBaseStorageType::Rds)
                .rds_configuration(
                    RdsConfiguration::builder()
                        .resource_arn(cluster_arn)
                        .credentials_secret_arn(secret_arn)
                        .database_name(database)
                        .table_name(table)
                        .field_mapping(mapping)
                        .build()
                        .map_err(invalid)?,
                )
                .build()
                .map_err(invalid)?
        }
    };
    Ok(config)
}

fn kb_status<'a>(status: impl Into<Option<&'a KnowledgeBaseStatus>>) -> String {
    status
        .into()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

fn job_status<'a>(status: impl Into<Option<&'a IngestionJobStatus>>) -> IngestionStatus {
    status
        .into()
        .map(|s| IngestionStatus::parse(s.as_str()))
        .unwrap_or_else(|| IngestionStatus::Unknown(String::new()))
}

fn convert_job(job: &aws_sdk_bedrockagent::types::IngestionJob) -> IngestionJob {
    IngestionJob {
        id: text_or_default(job.ingestion_job_id()),
        status: job_status(job.status()),
        started_at: opt::<&SdkDateTime>(job.started_at()).and_then(to_utc),
        updated_at: opt::<&SdkDateTime>(job.updated_at()).and_then(to_utc),
        failure_reasons: items(job.failure_reasons()).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_mapping() {
        assert_eq!(
            job_status(&IngestionJobStatus::Complete),
            IngestionStatus::Complete
        );
        assert_eq!(
            job_status(&IngestionJobStatus::InProgress),
            IngestionStatus::InProgress
        );
        assert!(job_status(None::<&IngestionJobStatus>).to_string().is_empty());
    }

    #[test]
    fn test_opensearch_storage_configuration() {
        let storage = storage_configuration(&VectorStorage::OpenSearch {
            collection_arn: "arn:aws:aoss:us-west-2:133720367604:collection/abc".into(),
            vector_index: "heavy-machinery-index".into(),
            vector_field: "vector".into(),
            text_field: "text".into(),
            metadata_field: "metadata".into(),
        })
        .unwrap();

        assert_eq!(
            opt::<&KnowledgeBaseStorageType>(storage.r#type()),
            Some(&KnowledgeBaseStorageType::OpensearchServerless)
        );
        let aoss = opt::<&OpenSearchServerlessConfiguration>(
            storage.opensearch_serverless_configuration(),
        )
        .unwrap();
        assert_eq!(text_or_default(aoss.vector_index_name()), "heavy-machinery-index");
    }

    #[test]
    fn test_aurora_storage_configuration() {
        let storage = storage_configuration(&VectorStorage::Aurora {
            cluster_arn: "arn:aws:rds:us-west-2:133720367604:cluster:my-aurora-serverless".into(),
            secret_arn: "arn:aws:secretsmanager:us-west-2:133720367604:secret:db".into(),
            database: "myapp".into(),
            table: "bedrock_integration.bedrock_kb".into(),
        })
        .unwrap();

        assert_eq!(
            opt::<&KnowledgeBaseStorageType>(storage.r#type()),
            Some(&KnowledgeBaseStorageType::Rds)
        );
        let rds = opt::<&RdsConfiguration>(storage.rds_configuration()).unwrap();
        assert_eq!(text_or_default(rds.table_name()), "bedrock_integration.bedrock_kb");
        let mapping = opt::<&RdsFieldMapping>(rds.field_mapping()).unwrap();
        assert_eq!(text_or_default(mapping.vector_field()), "embedding");
    }
}
