use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingBackend, EmbeddingError};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Local Ollama `/api/embed` backend. No retries: a local daemon is either up or not.
pub struct OllamaBackend {
    client: Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaBackend {
    pub fn new(url: String, model: String, dims: usize) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            model,
            dims,
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: EmbedResponse = response.json().await?;
        debug!(count = parsed.embeddings.len(), model = %self.model, "Ollama embeddings received");
        Ok(parsed.embeddings)
    }
}
