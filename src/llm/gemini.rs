use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::core::errors::WeaverError;

use super::provider::{EmbeddingProvider, GenerativeProvider, TaskIntent};

/// Client for the generative-language REST API, covering both embedding and
/// answer generation. Every request carries the configured timeout; a
/// timeout is a provider error like any other.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    embedding_model: String,
    embedding_dim: usize,
    chat_model: String,
    max_output_tokens: u32,
    temperature: f64,
    client: Client,
}

impl GeminiClient {
    pub fn new(settings: &Settings, api_key: String) -> Result<Self, WeaverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(WeaverError::provider)?;

        Ok(Self {
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: settings.embedding_model.clone(),
            embedding_dim: settings.embedding_dim,
            chat_model: settings.chat_model.clone(),
            max_output_tokens: settings.max_output_tokens,
            temperature: settings.temperature,
            client,
        })
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value, WeaverError> {
        let res = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(WeaverError::provider)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(WeaverError::Provider(format!(
                "gemini request failed ({status}): {text}"
            )));
        }

        res.json().await.map_err(WeaverError::provider)
    }
}

fn task_type(intent: TaskIntent) -> &'static str {
    match intent {
        TaskIntent::Document => "RETRIEVAL_DOCUMENT",
        TaskIntent::Query => "RETRIEVAL_QUERY",
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dim(&self) -> usize {
        self.embedding_dim
    }

    async fn embed(
        &self,
        texts: &[String],
        intent: TaskIntent,
    ) -> Result<Vec<Vec<f32>>, WeaverError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/models/{}:batchEmbedContents",
            self.base_url, self.embedding_model
        );
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", self.embedding_model),
                    "content": { "parts": [{ "text": text }] },
                    "taskType": task_type(intent),
                })
            })
            .collect();

        let payload = self.post(&url, json!({ "requests": requests })).await?;

        let mut embeddings = Vec::with_capacity(texts.len());
        if let Some(items) = payload["embeddings"].as_array() {
            for item in items {
                if let Some(values) = item["values"].as_array() {
                    let vector: Vec<f32> = values
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vector);
                }
            }
        }

        if embeddings.len() != texts.len() {
            return Err(WeaverError::Provider(format!(
                "gemini returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, WeaverError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.chat_model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
                "temperature": self.temperature,
            },
        });

        let payload = self.post(&url, body).await?;

        let content = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(WeaverError::Provider(
                "gemini returned an empty answer".to_string(),
            ));
        }

        Ok(content)
    }
}
