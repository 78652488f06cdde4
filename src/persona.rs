use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// How the advisor presents itself. Only `name` is required; any other
/// fields are kept and the known ones shape the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorPersona {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Value,
}

impl Default for AdvisorPersona {
    fn default() -> Self {
        Self {
            name: "Program Advisor".to_string(),
            attributes: serde_json::json!({
                "description": "an assistant that helps prospective students compare two graduate programs",
                "style": "clear, neutral and concise",
                "guidelines": [
                    "Base comparisons on the curriculum information you are given",
                    "Say so when you do not know something about a program"
                ]
            }),
        }
    }
}

impl AdvisorPersona {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid persona file {}", path.display()))
    }

    /// The default persona unless a file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    fn get_strings(&self, key: &str) -> Vec<String> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }

    pub fn generate_system_prompt(&self) -> String {
        let description = self.get_str("description").unwrap_or("an AI assistant");
        let style = self.get_str("style").unwrap_or("helpful and professional");

        let guidelines = self.get_strings("guidelines");
        let guidelines = if guidelines.is_empty() {
            String::new()
        } else {
            format!("\nFollow these guidelines: {}.", guidelines.join("; "))
        };

        let language = self
            .get_str("language")
            .map(|l| format!("\nAnswer in {}.", l))
            .unwrap_or_default();

        format!(
            "You are {}, {}. Your communication style is {}.{}{}",
            self.name, description, style, guidelines, language
        )
    }
}

impl std::fmt::Display for AdvisorPersona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
