use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

// Ollama's /api/embeddings takes one prompt per request.
pub struct OllamaEmbeddings {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let body = json!({
                "model": self.model,
                "prompt": text,
            });

            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.url))
                .json(&body)
                .send()
                .await
                .context("failed to call Ollama embeddings API")?;

            let data: OllamaEmbeddingResponse = resp
                .json()
                .await
                .context("failed to parse Ollama embeddings response")?;

            vectors.push(data.embedding);
        }
        Ok(vectors)
    }
}

// OpenAI-compatible /embeddings endpoint; the whole batch goes out in a
// single request.
pub struct OpenAiEmbeddings {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call embeddings API")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("embeddings API error ({status}): {detail}");
        }

        let data: OpenAiEmbeddingResponse = resp
            .json()
            .await
            .context("failed to parse embeddings response")?;

        if data.data.len() != texts.len() {
            anyhow::bail!(
                "embeddings API returned {} vectors for {} inputs",
                data.data.len(),
                texts.len()
            );
        }

        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}
