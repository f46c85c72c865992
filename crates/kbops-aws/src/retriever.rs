//! Knowledge base retrieval via the Bedrock agent runtime
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, invalid, items, opt, text, text_or_default, AwsContext};
use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::types::{
    KnowledgeBaseQuery, KnowledgeBaseRetrievalConfiguration,
    KnowledgeBaseRetrieveAndGenerateConfiguration, KnowledgeBaseVectorSearchConfiguration,
    RetrievalResultContent, RetrievalResultLocation, RetrieveAndGenerateConfiguration,
    RetrieveAndGenerateInput, RetrieveAndGenerateOutput, RetrieveAndGenerateType,
};
use kbops_core::{GeneratedAnswer, KnowledgeBaseRetriever, Result, RetrievedPassage};

/// Bedrock agent runtime client
#[derive(Clone, Debug)]
pub struct BedrockRetriever {
    client: aws_sdk_bedrockagentruntime::Client,
}

impl BedrockRetriever {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: aws_sdk_bedrockagentruntime::Client::new(ctx.sdk_config()),
        }
    }

    /// Managed retrieval plus generation in one call
    pub async fn retrieve_and_generate(
        &self,
        kb_id: &str,
        model_arn: &str,
        query: &str,
    ) -> Result<GeneratedAnswer> {
        let input = RetrieveAndGenerateInput::builder()
            .text(query)
            .build()
            .map_err(invalid)?;

        let kb_config = KnowledgeBaseRetrieveAndGenerateConfiguration::builder()
            .knowledge_base_id(kb_id)
            .model_arn(model_arn)
            .build()
            .map_err(invalid)?;

        let config = RetrieveAndGenerateConfiguration::builder()
            .r#type(RetrieveAndGenerateType::KnowledgeBase)
            .knowledge_base_configuration(kb_config)
            .build()
            .map_err(invalid)?;

        let out = self
            .client
            .retrieve_and_generate()
            .input(input)
            .retrieve_and_generate_configuration(config)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent-runtime", e))?;

        let answer = opt::<&RetrieveAndGenerateOutput>(out.output())
            .map(|o| text_or_default(o.text()))
            .unwrap_or_default();

        let citations = items(out.citations())
            .iter()
            .flat_map(|c| items(c.retrieved_references()).iter())
            .filter_map(|r| opt::<&RetrievalResultLocation>(r.location()).and_then(s3_uri))
            .collect();

        Ok(GeneratedAnswer {
            text: answer,
            citations,
        })
    }
}

fn s3_uri(location: &RetrievalResultLocation) -> Option<String> {
    location.s3_location().and_then(|s3| text(s3.uri()))
}

fn passage_text(content: &RetrievalResultContent) -> String {
    text(content.text()).unwrap_or_default()
}

#[async_trait]
impl KnowledgeBaseRetriever for BedrockRetriever {
    async fn retrieve(
        &self,
        kb_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let retrieval_query = KnowledgeBaseQuery::builder()
            .text(query)
            .build()
            .map_err(invalid)?;

        let vector_search = KnowledgeBaseVectorSearchConfiguration::builder()
            .number_of_results(i32::try_from(limit).unwrap_or(i32::MAX))
            .build();

        let retrieval_config = KnowledgeBaseRetrievalConfiguration::builder()
            .vector_search_configuration(vector_search)
            .build()
            .map_err(invalid)?;

        tracing::debug!(kb_id, limit, "retrieving passages");

        let out = self
            .client
            .retrieve()
            .knowledge_base_id(kb_id)
            .retrieval_query(retrieval_query)
            .retrieval_configuration(retrieval_config)
            .send()
            .await
            .map_err(|e| from_sdk("bedrock-agent-runtime", e))?;

        let passages = items(out.retrieval_results())
            .iter()
            .map(|r| RetrievedPassage {
                text: opt::<&RetrievalResultContent>(r.content())
                    .map(passage_text)
                    .unwrap_or_default(),
                score: opt::<f64>(r.score()),
                source_uri: opt::<&RetrievalResultLocation>(r.location()).and_then(s3_uri),
            })
            .collect::<Vec<_>>();

        tracing::info!(kb_id, found = passages.len(), "retrieval complete");
        Ok(passages)
    }
}
