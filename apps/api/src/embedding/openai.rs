use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EmbeddingBackend, EmbeddingError};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI `/v1/embeddings` backend. Batches the whole input in one request.
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String, dims: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            dims,
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    /// Retries on 429 and 5xx with exponential backoff; other 4xx fail immediately.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "OpenAI embedding attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbeddingError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
                continue;
            }

            if !status.is_success() {
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let parsed: EmbeddingsResponse = response.json().await?;
            debug!(count = parsed.data.len(), model = %self.model, "OpenAI embeddings received");
            return Ok(into_ordered_vectors(parsed.data));
        }

        Err(last_error.unwrap_or_else(|| {
            EmbeddingError::InvalidResponse("no response after retries".to_string())
        }))
    }
}

/// The API tags each vector with its input position; do not trust array order.
fn into_ordered_vectors(mut items: Vec<EmbeddingItem>) -> Vec<Vec<f32>> {
    items.sort_by_key(|item| item.index);
    items.into_iter().map(|item| item.embedding).collect()
}
