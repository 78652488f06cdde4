use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::llm::chat::Assistant;
use crate::persona::AdvisorPersona;
use crate::providers::traits::GenerationOptions;

mod system;

pub use system::{print_help, SystemAction};

/// Interprets one line of REPL input.
pub struct CommandHandler {
    assistant: Arc<Assistant>,
    persona: AdvisorPersona,
}

impl CommandHandler {
    pub fn new(assistant: Arc<Assistant>, persona: AdvisorPersona) -> Self {
        Self { assistant, persona }
    }

    pub fn persona(&self) -> &AdvisorPersona {
        &self.persona
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<SystemAction, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(SystemAction::Continue);
        }

        match input.to_lowercase().as_str() {
            "help" | "exit" | "quit" => return system::handle_command(input),
            "model" => return self.show_model().await,
            "prompt" => {
                println!("{}", self.assistant.provider().system_prompt().truecolor(180, 180, 180));
                return Ok(SystemAction::Continue);
            }
            _ => {}
        }

        if let Some(path) = input.strip_prefix("persona ") {
            return self.load_persona(Path::new(path.trim())).await;
        }

        if let Some(question) = input.strip_prefix("search ") {
            return self.show_passages(question.trim()).await;
        }

        if let Some(rest) = input.strip_prefix("image ") {
            return self.ask_about_image(rest.trim()).await;
        }

        self.handle_chat(input).await
    }

    async fn show_model(&self) -> Result<SystemAction, String> {
        let info = self
            .assistant
            .provider()
            .get_model_info()
            .await
            .map_err(|e| format!("Failed to get model info: {}", e))?;
        println!("🤖 Model: {}", info.cyan());
        Ok(SystemAction::Continue)
    }

    async fn load_persona(&mut self, path: &Path) -> Result<SystemAction, String> {
        let persona = AdvisorPersona::from_file(path).map_err(|e| format!("{:#}", e))?;
        self.assistant
            .provider()
            .update_system_prompt(persona.generate_system_prompt())
            .await
            .map_err(|e| format!("Failed to update persona: {}", e))?;
        println!("🔄 Persona switched to {}", persona.name.cyan());
        self.persona = persona;
        Ok(SystemAction::Continue)
    }

    async fn show_passages(&self, question: &str) -> Result<SystemAction, String> {
        let retriever = self
            .assistant
            .retriever()
            .ok_or_else(|| "Retrieval is disabled. Start the chat with --retrieval.".to_string())?;
        let hits = retriever
            .search(question)
            .await
            .map_err(|e| format!("Search failed: {}", e))?;

        if hits.is_empty() {
            println!("No matching passages.");
        } else {
            print!("{}", crate::llm::semantic_search::format_results(&hits));
        }
        Ok(SystemAction::Continue)
    }

    async fn ask_about_image(&self, rest: &str) -> Result<SystemAction, String> {
        let (path, question) = rest
            .split_once(char::is_whitespace)
            .map(|(p, q)| (p, q.trim()))
            .unwrap_or((rest, "Describe this image."));

        let response = self
            .assistant
            .provider()
            .complete_with_images(question, &[PathBuf::from(path)], &GenerationOptions::for_images())
            .await
            .map_err(|e| format!("Failed to get AI response: {}", e))?;
        print_response(&response);
        Ok(SystemAction::Continue)
    }

    async fn handle_chat(&self, input: &str) -> Result<SystemAction, String> {
        let response = self
            .assistant
            .respond(input)
            .await
            .map_err(|e| format!("Failed to get AI response: {}", e))?;
        print_response(&response);
        Ok(SystemAction::Continue)
    }
}

fn print_response(response: &str) {
    println!("{}", response.truecolor(255, 236, 179));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use std::io::Write;

    fn handler(provider: &ScriptedProvider) -> CommandHandler {
        let assistant = Arc::new(Assistant::new(Box::new(provider.clone())));
        CommandHandler::new(assistant, AdvisorPersona::default())
    }

    #[tokio::test]
    async fn plain_text_goes_to_the_assistant() {
        let provider = ScriptedProvider::replying("Both take two years.");
        let mut handler = handler(&provider);

        assert_eq!(handler.handle_command("How long?").await, Ok(SystemAction::Continue));
        assert_eq!(handler.handle_command("").await, Ok(SystemAction::Continue));
        assert_eq!(provider.prompts.lock().as_slice(), ["How long?"]);
    }

    #[tokio::test]
    async fn exit_stops_the_loop() {
        let provider = ScriptedProvider::replying("unused");
        let mut handler = handler(&provider);
        assert_eq!(handler.handle_command("exit").await, Ok(SystemAction::Exit));
        assert!(provider.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn persona_file_updates_system_prompt() {
        let provider = ScriptedProvider::replying("ok");
        let mut handler = handler(&provider);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "Mentor"}}"#).unwrap();
        let command = format!("persona {}", file.path().display());

        handler.handle_command(&command).await.unwrap();
        assert_eq!(handler.persona().name, "Mentor");
        assert!(provider.system_prompt().starts_with("You are Mentor"));

        assert!(handler.handle_command("persona /no/such/file.json").await.is_err());
        assert_eq!(handler.persona().name, "Mentor");
    }

    #[tokio::test]
    async fn search_requires_retrieval() {
        let provider = ScriptedProvider::replying("ok");
        let mut handler = handler(&provider);
        let err = handler.handle_command("search thesis").await.unwrap_err();
        assert!(err.contains("--retrieval"));
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let mut handler = handler(&ScriptedProvider::failing());
        let err = handler.handle_command("hello").await.unwrap_err();
        assert!(err.starts_with("Failed to get AI response"));
    }
}
