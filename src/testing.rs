//! Test doubles for the services the crate talks to.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::providers::{CompletionProvider, GenerationOptions};

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_mock(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    format!("http://{}", addr)
}

/// Provider double that records prompts and answers from a script.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    pub reply: Option<String>,
    pub embedding: Vec<f32>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub embedded: Arc<Mutex<Vec<String>>>,
    pub system: Arc<Mutex<String>>,
}

impl ScriptedProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            embedding: vec![0.5; 4],
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            embedding: vec![0.5; 4],
            ..Self::default()
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete_with_options(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.reply.clone().ok_or_else(|| anyhow!("backend unavailable"))
    }

    async fn complete_with_images(&self, prompt: &str, _images: &[PathBuf], options: &GenerationOptions) -> Result<String> {
        self.complete_with_options(prompt, options).await
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embedded.lock().push(text.to_string());
        Ok(self.embedding.clone())
    }

    async fn update_system_prompt(&self, system_prompt: String) -> Result<()> {
        *self.system.lock() = system_prompt;
        Ok(())
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok("scripted".to_string())
    }

    fn system_prompt(&self) -> String {
        self.system.lock().clone()
    }

    fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync> {
        Box::new(self.clone())
    }
}
