use anyhow::{Error, Result};

use crate::llm::semantic_search::KnowledgeRetriever;
use crate::providers::traits::CompletionProvider;

/// Answers one message at a time, optionally grounded on retrieved passages.
pub struct Assistant {
    provider: Box<dyn CompletionProvider + Send + Sync>,
    retriever: Option<KnowledgeRetriever>,
}

impl Assistant {
    pub fn new(provider: Box<dyn CompletionProvider + Send + Sync>) -> Self {
        Self {
            provider,
            retriever: None,
        }
    }

    pub fn with_retriever(mut self, retriever: KnowledgeRetriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn provider(&self) -> &(dyn CompletionProvider + Send + Sync) {
        self.provider.as_ref()
    }

    pub fn retriever(&self) -> Option<&KnowledgeRetriever> {
        self.retriever.as_ref()
    }

    pub async fn respond(&self, user_message: &str) -> Result<String> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return Err(Error::msg("Message is empty"));
        }

        let prompt = match &self.retriever {
            Some(retriever) => match retriever.context_for(user_message).await {
                Ok(Some(context)) => build_prompt(Some(&context), user_message),
                Ok(None) => build_prompt(None, user_message),
                Err(e) => {
                    // Answer without context rather than not at all
                    log::warn!("Retrieval failed, answering without context: {}", e);
                    build_prompt(None, user_message)
                }
            },
            None => build_prompt(None, user_message),
        };

        let response = self.provider.complete(&prompt).await?;
        Ok(response.trim().to_string())
    }
}

fn build_prompt(context: Option<&str>, user_message: &str) -> String {
    match context {
        Some(context) => format!(
            "Relevant curriculum excerpts:\n{}\nUser: {}\nAssistant:",
            context, user_message
        ),
        None => user_message.to_string(),
    }
}
