//! Vector index creation on an OpenSearch Serverless collection
//!
//! The collection data plane has no SDK client, so the index is created
//! with a SigV4-signed `PUT {endpoint}/{index}` request.
//!
//! Author: hephaex@gmail.com

use crate::collection::Provisioned;
use crate::AwsContext;
use aws_credential_types::provider::ProvideCredentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use kbops_core::{KbError, Result};
use serde_json::{json, Value};
use std::time::SystemTime;

/// Signing name of the serverless collection data plane
const SERVICE: &str = "aoss";

/// k-NN index mapping for a Bedrock knowledge base
pub fn index_mapping(
    vector_field: &str,
    text_field: &str,
    metadata_field: &str,
    dimension: u32,
) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        vector_field.to_string(),
        json!({
            "type": "knn_vector",
            "dimension": dimension,
            "method": {
                "name": "hnsw",
                "space_type": "cosinesimil",
                "engine": "nmslib",
                "parameters": {
                    "ef_construction": 512,
                    "ef_search": 512,
                    "m": 16
                }
            }
        }),
    );
    properties.insert(text_field.to_string(), json!({ "type": "text" }));
    properties.insert(metadata_field.to_string(), json!({ "type": "text" }));

    json!({
        "settings": {
            "index": {
                "knn": true,
                "knn.algo_param.ef_search": 512,
                "knn.algo_param.ef_construction": 512,
                "knn.space_type": "cosinesimil"
            }
        },
        "mappings": {
            "properties": properties
        }
    })
}

/// Signed HTTP client for the collection endpoint
#[derive(Clone, Debug)]
pub struct VectorIndexClient {
    ctx: AwsContext,
    http: reqwest::Client,
}

impl VectorIndexClient {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            ctx: ctx.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Create `index` on the collection at `endpoint`
    pub async fn create_index(&self, endpoint: &str, index: &str, mapping: &Value) -> Result<Provisioned> {
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), index);
        let body = serde_json::to_vec(mapping)?;
        let host = host_of(&url)?;

        let signed = self.sign_headers("PUT", &url, &host, &body).await?;

        tracing::info!(%url, "creating vector index");

        let mut request = self
            .http
            .put(&url)
            .header("content-type", "application/json")
            .body(body);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| KbError::Service {
                service: SERVICE.to_string(),
                code: "RequestFailed".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            tracing::info!(index, "vector index created");
            return Ok(Provisioned::Created);
        }
        if text.contains("resource_already_exists_exception") {
            tracing::info!(index, "vector index already exists");
            return Ok(Provisioned::AlreadyExists);
        }

        Err(match status.as_u16() {
            403 => KbError::AccessDenied(format!("{SERVICE}: {text}")),
            404 => KbError::NotFound(format!("{SERVICE}: {text}")),
            code => KbError::Service {
                service: SERVICE.to_string(),
                code: code.to_string(),
                message: text,
            },
        })
    }

    async fn sign_headers(
        &self,
        method: &str,
        url: &str,
        host: &str,
        body: &[u8],
    ) -> Result<Vec<(String, String)>> {
        let provider = self
            .ctx
            .sdk_config()
            .credentials_provider()
            .ok_or_else(|| KbError::Credentials("no credentials provider configured".to_string()))?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| KbError::Credentials(format!("Unable to load credentials: {e}")))?;
        let identity = credentials.into();

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(self.ctx.region())
            .name(SERVICE)
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(|e| KbError::Validation(format!("signing parameters: {e}")))?
            .into();

        let headers = [("host", host), ("content-type", "application/json")];
        let signable = SignableRequest::new(
            method,
            url,
            headers.into_iter(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| KbError::Validation(format!("signable request: {e}")))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| KbError::Validation(format!("request signing: {e}")))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

fn host_of(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| KbError::Validation(format!("invalid endpoint {url}: {e}")))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| KbError::Validation(format!("endpoint {url} has no host")))
}
