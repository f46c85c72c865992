//! Source documents in S3
//!
//! Author: hephaex@gmail.com

use crate::{from_sdk, items, text, AwsContext};
use kbops_core::Result;

/// S3 location holding the knowledge base source PDFs
#[derive(Clone, Debug)]
pub struct DocumentBucket {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl DocumentBucket {
    pub fn new(ctx: &AwsContext, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(ctx.sdk_config()),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// `s3://bucket/prefix`
    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }

    /// Keys of all PDF documents under the prefix
    pub async fn list_pdfs(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let out = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| from_sdk("s3", e))?;

            keys.extend(
                items(out.contents())
                    .iter()
                    .filter_map(|obj| text(obj.key()))
                    .filter(|key| is_pdf(key)),
            );

            match text(out.next_continuation_token()) {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(bucket = %self.bucket, count = keys.len(), "listed PDF documents");
        Ok(keys)
    }
}

fn is_pdf(key: &str) -> bool {
    key.to_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf("documents/BD850_spec.pdf"));
        assert!(is_pdf("documents/manual.PDF"));
        assert!(!is_pdf("documents/"));
        assert!(!is_pdf("documents/notes.txt"));
    }
}
