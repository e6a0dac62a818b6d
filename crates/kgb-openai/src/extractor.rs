//! Extraction model backed by an OpenAI-compatible endpoint.

use async_trait::async_trait;
use kgb_core::{ExtractionModel, ExtractionPrompt, KgbError};

use crate::OpenAIClient;

/// Sends the extraction prompt as one system and one user message.
#[derive(Debug, Clone)]
pub struct OpenAIExtractor {
    client: OpenAIClient,
}

impl OpenAIExtractor {
    /// Create a new extractor from an OpenAI-compatible client.
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExtractionModel for OpenAIExtractor {
    fn model_name(&self) -> &str {
        self.client.default_model()
    }

    async fn complete(&self, prompt: &ExtractionPrompt) -> kgb_core::Result<String> {
        self.client
            .simple_chat(&prompt.system, &prompt.user)
            .await
            .map_err(|e| KgbError::LlmRequest(format!("{e:#}")))
    }
}
