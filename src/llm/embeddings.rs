use anyhow::{Error, Result};

use crate::providers::traits::CompletionProvider;

/// Embeds text through the active provider and checks the vector width
/// against what the vector store was created with.
pub struct EmbeddingGenerator {
    provider: Box<dyn CompletionProvider + Send + Sync>,
    dimension: u64,
}

impl EmbeddingGenerator {
    pub fn new(provider: Box<dyn CompletionProvider + Send + Sync>, dimension: u64) -> Self {
        Self { provider, dimension }
    }

    pub fn dimension(&self) -> u64 {
        self.dimension
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::msg("Cannot embed empty text"));
        }

        let embedding = self.provider.generate_embedding(text).await?;

        if embedding.len() as u64 != self.dimension {
            return Err(Error::msg(format!(
                "Generated embedding has wrong size: {} (expected {})",
                embedding.len(),
                self.dimension
            )));
        }

        Ok(embedding)
    }

    pub async fn generate_batch_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let embedding = self.generate_embedding(text).await?;
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }
}
