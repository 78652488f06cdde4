use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::LocalConfig;
use crate::providers::traits::{CompletionProvider, GenerationOptions};
use crate::providers::utils::{encode_image_to_data_uri, strip_reasoning};

/// Client for a locally served model behind an OpenAI-compatible API.
#[derive(Clone)]
pub struct LocalOpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    embedding_url: String,
    embedding_model: String,
    system_message: Arc<RwLock<String>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl LocalOpenAIProvider {
    pub fn new(config: &LocalConfig, system_message: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            embedding_url: config.embedding_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            system_message: Arc::new(RwLock::new(system_message)),
        })
    }

    fn messages(&self, user_content: Value) -> Result<Vec<Value>> {
        let system_message = self
            .system_message
            .read()
            .map_err(|e| anyhow!("Failed to read system message: {}", e))?
            .clone();

        let mut messages = Vec::with_capacity(2);
        if !system_message.is_empty() {
            messages.push(json!({ "role": "system", "content": system_message }));
        }
        messages.push(json!({ "role": "user", "content": user_content }));
        Ok(messages)
    }

    async fn send_chat(&self, messages: Vec<Value>, options: &GenerationOptions, label: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        log::debug!("Sending {} request to {}", label, self.base_url);
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("server {} request failed: {}", label, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("server {} request failed: Status {}, Body: {}", label, status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse server {} response: {}", label, e))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Failed to parse server {} response: no content", label))?;

        let text = strip_reasoning(&content);
        if text.is_empty() {
            return Err(anyhow!("Server {} response was empty", label));
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionProvider for LocalOpenAIProvider {
    async fn complete_with_options(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let messages = self.messages(json!([{ "type": "text", "text": prompt }]))?;
        self.send_chat(messages, options, "generate").await
    }

    async fn complete_with_images(
        &self,
        prompt: &str,
        images: &[PathBuf],
        options: &GenerationOptions,
    ) -> Result<String> {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        for path in images {
            let data_uri = encode_image_to_data_uri(path)?;
            content.push(json!({ "type": "image_url", "image_url": { "url": data_uri } }));
        }

        let messages = self.messages(Value::Array(content))?;
        self.send_chat(messages, options, "generate_with_images").await
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.embedding_url))
            .json(&json!({ "model": self.embedding_model, "input": text }));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("Embedding request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Embedding request failed: Status {}, Body: {}", status, body));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("No embedding returned from {}", self.embedding_url))
    }

    async fn update_system_prompt(&self, system_prompt: String) -> Result<()> {
        let mut guard = self.system_message.write().map_err(|e| anyhow!("Lock error: {}", e))?;
        *guard = system_prompt;
        Ok(())
    }

    async fn get_model_info(&self) -> Result<String> {
        let mut builder = self.client.get(format!("{}/models", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?.error_for_status()?;
        let body: Value = response.json().await?;

        Ok(body
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|m| m.get("id"))
            .and_then(|id| id.as_str())
            .unwrap_or(self.model.as_str())
            .to_string())
    }

    fn system_prompt(&self) -> String {
        self.system_message.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync> {
        Box::new(self.clone())
    }
}
