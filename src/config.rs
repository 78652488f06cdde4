use std::collections::HashMap;
use std::env;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which reasoning backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Hosted,
    Local,
    /// Local when a GPU is visible, hosted otherwise.
    Auto,
}

impl BackendChoice {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "openai" | "hosted" => Ok(Self::Hosted),
            "local" => Ok(Self::Local),
            "auto" | "" => Ok(Self::Auto),
            _ => Err(ConfigError::Invalid {
                name: "LLM_BACKEND",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub embedding_url: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub arangodb_url: Option<String>,
    pub arangodb_username: String,
    pub arangodb_password: Option<String>,
    pub arangodb_database: String,
    pub qdrant_url: Option<String>,
    pub embedding_size: u64,
    pub score_threshold: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ServeSettings {
    pub python: String,
    pub module: String,
    pub install_packages: Vec<String>,
}

/// Pinned runtime packages installed before the model server starts.
pub const DEFAULT_INSTALL_PACKAGES: [&str; 2] = ["sglang[all]==0.4.6.post5", "transformers==4.51.3"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: Option<String>,
    pub backend: BackendChoice,
    pub hosted: HostedConfig,
    pub local: LocalConfig,
    pub stores: StoreConfig,
    pub serve: ServeSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values in a .env template count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let backend = match get("LLM_BACKEND") {
            Some(v) => BackendChoice::parse(&v)?,
            None => BackendChoice::Auto,
        };

        let embedding_size = match get("EMBEDDING_SIZE") {
            Some(v) => v.trim().parse::<u64>().ok().filter(|n| *n > 0).ok_or(ConfigError::Invalid {
                name: "EMBEDDING_SIZE",
                value: v,
            })?,
            None => 1536,
        };

        let score_threshold = match get("RETRIEVAL_SCORE_THRESHOLD") {
            Some(v) => Some(v.trim().parse::<f32>().map_err(|_| ConfigError::Invalid {
                name: "RETRIEVAL_SCORE_THRESHOLD",
                value: v,
            })?),
            None => None,
        };

        let install_packages = get("SERVE_INSTALL_PACKAGES")
            .map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_INSTALL_PACKAGES.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            telegram_token: get("TELEGRAM_TOKEN"),
            backend,
            hosted: HostedConfig {
                api_key: get("OPENAI_API_KEY"),
                chat_model: get_or("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
                embedding_model: get_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            },
            local: LocalConfig {
                base_url: get_or("LOCAL_LLM_URL", "http://localhost:30000/v1"),
                model: get_or("LOCAL_LLM_MODEL", "Qwen/Qwen3-4B-AWQ"),
                api_key: get("LOCAL_LLM_API_KEY"),
                embedding_url: get_or("EMBEDDING_URL", "http://localhost:8080/v1"),
                embedding_model: get_or("EMBEDDING_MODEL", "BAAI/bge-small-en-v1.5"),
            },
            stores: StoreConfig {
                arangodb_url: get("ARANGODB_URL"),
                arangodb_username: get_or("ARANGODB_USERNAME", "root"),
                arangodb_password: get("ARANGODB_ROOT_PASSWORD"),
                arangodb_database: get_or("ARANGODB_DATABASE", "_system"),
                qdrant_url: get("QDRANT_URL"),
                embedding_size,
                score_threshold,
            },
            serve: ServeSettings {
                python: get_or("SERVE_PYTHON", "python3"),
                module: get_or("SERVE_MODULE", "sglang.launch_server"),
                install_packages,
            },
        })
    }

    pub fn require_telegram_token(&self) -> Result<&str, ConfigError> {
        self.telegram_token.as_deref().ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))
    }

    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.hosted.api_key.as_deref().ok_or(ConfigError::Missing("OPENAI_API_KEY"))
    }

    pub fn require_qdrant_url(&self) -> Result<&str, ConfigError> {
        self.stores.qdrant_url.as_deref().ok_or(ConfigError::Missing("QDRANT_URL"))
    }

    pub fn require_arangodb_url(&self) -> Result<&str, ConfigError> {
        self.stores.arangodb_url.as_deref().ok_or(ConfigError::Missing("ARANGODB_URL"))
    }

    pub fn require_arangodb_password(&self) -> Result<&str, ConfigError> {
        self.stores
            .arangodb_password
            .as_deref()
            .ok_or(ConfigError::Missing("ARANGODB_ROOT_PASSWORD"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.backend, BackendChoice::Auto);
        assert_eq!(config.local.base_url, "http://localhost:30000/v1");
        assert_eq!(config.local.model, "Qwen/Qwen3-4B-AWQ");
        assert_eq!(config.stores.arangodb_username, "root");
        assert_eq!(config.stores.arangodb_database, "_system");
        assert_eq!(config.stores.embedding_size, 1536);
        assert_eq!(config.serve.python, "python3");
        assert_eq!(config.serve.install_packages.len(), 2);
        assert_eq!(config.require_telegram_token(), Err(ConfigError::Missing("TELEGRAM_TOKEN")));
    }

    #[test]
    fn reads_deployment_variables() {
        let config = AppConfig::from_map(&vars(&[
            ("TELEGRAM_TOKEN", "123:abc"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ARANGODB_URL", "http://arangodb:8529"),
            ("ARANGODB_ROOT_PASSWORD", "secret"),
            ("QDRANT_URL", "http://qdrant:6333"),
            ("LLM_BACKEND", "OpenAI"),
        ]))
        .unwrap();

        assert_eq!(config.require_telegram_token().unwrap(), "123:abc");
        assert_eq!(config.require_openai_key().unwrap(), "sk-test");
        assert_eq!(config.require_arangodb_url().unwrap(), "http://arangodb:8529");
        assert_eq!(config.require_arangodb_password().unwrap(), "secret");
        assert_eq!(config.require_qdrant_url().unwrap(), "http://qdrant:6333");
        assert_eq!(config.backend, BackendChoice::Hosted);
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config = AppConfig::from_map(&vars(&[("OPENAI_API_KEY", "  "), ("LLM_BACKEND", "")])).unwrap();
        assert!(config.hosted.api_key.is_none());
        assert_eq!(config.backend, BackendChoice::Auto);
    }

    #[test]
    fn rejects_unknown_backend_and_bad_numbers() {
        let err = AppConfig::from_map(&vars(&[("LLM_BACKEND", "gpu-cluster")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LLM_BACKEND", .. }));

        let err = AppConfig::from_map(&vars(&[("EMBEDDING_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "EMBEDDING_SIZE", .. }));

        let err = AppConfig::from_map(&vars(&[("RETRIEVAL_SCORE_THRESHOLD", "high")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RETRIEVAL_SCORE_THRESHOLD", .. }));
    }

    #[test]
    fn install_packages_override_is_split_on_commas() {
        let config = AppConfig::from_map(&vars(&[("SERVE_INSTALL_PACKAGES", "vllm==0.8.5, ,flashinfer-python")])).unwrap();
        assert_eq!(config.serve.install_packages, vec!["vllm==0.8.5", "flashinfer-python"]);
    }
}
