use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Sampling knobs for a single completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..Self::default()
        }
    }

    /// Defaults used for image prompts.
    pub fn for_images() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: Some(512),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with_options(prompt, &GenerationOptions::default()).await
    }

    async fn complete_with_options(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    async fn complete_with_images(
        &self,
        prompt: &str,
        images: &[PathBuf],
        options: &GenerationOptions,
    ) -> Result<String>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    async fn update_system_prompt(&self, system_prompt: String) -> Result<()>;

    async fn get_model_info(&self) -> Result<String>;

    fn system_prompt(&self) -> String;

    fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync>;
}

impl Clone for Box<dyn CompletionProvider + Send + Sync> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Completes `prompt` and parses the answer as `T`.
pub async fn complete_json<T: DeserializeOwned>(
    provider: &dyn CompletionProvider,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<T> {
    let response = provider.complete_with_options(prompt, options).await?;
    parse_json_response(&response)
}

pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T> {
    let body = strip_code_fence(response);
    serde_json::from_str(body).with_context(|| format!("Invalid JSON structure in model response: {}", body))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
