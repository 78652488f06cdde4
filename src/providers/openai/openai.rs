use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs, EmbeddingInput,
    },
    Client,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::HostedConfig;
use crate::providers::traits::{CompletionProvider, GenerationOptions};

/// Pause after a failed hosted request before the error is surfaced.
const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct OpenAIProvider {
    system_message: Arc<RwLock<String>>,
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    retry_pause: Duration,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, config: &HostedConfig, system_message: String) -> Self {
        let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));

        Self {
            system_message: Arc::new(RwLock::new(system_message)),
            client,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    pub fn with_retry_pause(mut self, retry_pause: Duration) -> Self {
        self.retry_pause = retry_pause;
        self
    }

    fn build_messages(&self, prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        let system_message = self
            .system_message
            .read()
            .map_err(|e| anyhow!("Failed to read system message: {}", e))?
            .clone();

        let mut messages = Vec::with_capacity(2);
        if !system_message.is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_message)
                    .build()?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        );
        Ok(messages)
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete_with_options(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.chat_model)
            .messages(self.build_messages(prompt)?)
            .temperature(options.temperature);
        if let Some(max_tokens) = options.max_tokens {
            request.max_tokens(u16::try_from(max_tokens).unwrap_or(u16::MAX));
        }
        let request = request.build()?;

        let response = match self.client.chat().create(request).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("OpenAI request failed, pausing {}s: {}", self.retry_pause.as_secs(), e);
                tokio::time::sleep(self.retry_pause).await;
                return Err(anyhow!("OpenAI generate request failed: {}", e));
            }
        };

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("Failed to parse OpenAI generate response: no content"))
    }

    async fn complete_with_images(
        &self,
        _prompt: &str,
        _images: &[PathBuf],
        _options: &GenerationOptions,
    ) -> Result<String> {
        Err(anyhow!("Image input is only supported by the local backend"))
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        if let Some(embedding) = response.data.first() {
            Ok(embedding.embedding.clone())
        } else {
            Err(anyhow!("No embedding returned from OpenAI"))
        }
    }

    async fn update_system_prompt(&self, system_prompt: String) -> Result<()> {
        let mut guard = self.system_message.write().map_err(|e| anyhow!("Lock error: {}", e))?;
        *guard = system_prompt;
        Ok(())
    }

    async fn get_model_info(&self) -> Result<String> {
        let model = self.client.models().retrieve(&self.chat_model).await?;
        Ok(model.id)
    }

    fn system_prompt(&self) -> String {
        self.system_message.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosted() -> HostedConfig {
        HostedConfig {
            api_key: Some("sk-test".to_string()),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    #[test]
    fn builds_system_and_user_messages() {
        let provider = OpenAIProvider::new("sk-test", &hosted(), "Advise".to_string());
        assert_eq!(provider.build_messages("Compare them").unwrap().len(), 2);

        let provider = OpenAIProvider::new("sk-test", &hosted(), String::new());
        assert_eq!(provider.build_messages("Compare them").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_image_prompts() {
        let provider = OpenAIProvider::new("sk-test", &hosted(), String::new());
        let err = provider
            .complete_with_images("Describe", &[PathBuf::from("map.jpg")], &GenerationOptions::for_images())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("local backend"));
    }

    #[tokio::test]
    async fn system_prompt_can_be_replaced() {
        let provider = OpenAIProvider::new("sk-test", &hosted(), "old".to_string())
            .with_retry_pause(Duration::from_millis(1));
        provider.update_system_prompt("new".to_string()).await.unwrap();
        assert_eq!(provider.system_prompt(), "new");
    }
}
