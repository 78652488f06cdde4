use anyhow::Result;
use std::path::Path;
use tokio::process::Command;

use crate::config::{AppConfig, BackendChoice};
use crate::providers::local::local::LocalOpenAIProvider;
use crate::providers::openai::openai::OpenAIProvider;
use crate::providers::traits::CompletionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Hosted,
    Local,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Hosted => write!(f, "hosted OpenAI API"),
            BackendKind::Local => write!(f, "local model server"),
        }
    }
}

/// True when an NVIDIA device is visible to this process.
pub async fn gpu_available() -> bool {
    if Path::new("/dev/nvidia0").exists() {
        return true;
    }
    match Command::new("nvidia-smi").arg("-L").output().await {
        Ok(output) => output.status.success() && !output.stdout.is_empty(),
        Err(_) => false,
    }
}

pub fn resolve_backend(choice: BackendChoice, has_gpu: bool) -> BackendKind {
    match choice {
        BackendChoice::Hosted => BackendKind::Hosted,
        BackendChoice::Local => BackendKind::Local,
        BackendChoice::Auto if has_gpu => BackendKind::Local,
        BackendChoice::Auto => BackendKind::Hosted,
    }
}

pub async fn select_backend(config: &AppConfig) -> BackendKind {
    let has_gpu = match config.backend {
        BackendChoice::Auto => gpu_available().await,
        _ => false,
    };
    let kind = resolve_backend(config.backend, has_gpu);
    log::info!("Using {} for completions", kind);
    kind
}

pub fn build_provider(
    kind: BackendKind,
    config: &AppConfig,
    system_prompt: String,
) -> Result<Box<dyn CompletionProvider + Send + Sync>> {
    match kind {
        BackendKind::Hosted => {
            let api_key = config.require_openai_key()?;
            Ok(Box::new(OpenAIProvider::new(api_key, &config.hosted, system_prompt)))
        }
        BackendKind::Local => Ok(Box::new(LocalOpenAIProvider::new(&config.local, system_prompt)?)),
    }
}

pub async fn create_provider(
    config: &AppConfig,
    system_prompt: String,
) -> Result<Box<dyn CompletionProvider + Send + Sync>> {
    let kind = select_backend(config).await;
    build_provider(kind, config, system_prompt)
}
