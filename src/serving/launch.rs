use std::process::{ExitStatus, Stdio};

use log::{error, info, warn};
use thiserror::Error;
use tokio::process::Command;
use validator::Validate;

use crate::config::ServeSettings;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Invalid launch configuration: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Installing {package} failed with {status}")]
    InstallFailed { package: String, status: ExitStatus },
    #[error("Model server exited with {0}")]
    ServerExited(ExitStatus),
}

/// Flags handed to the model-serving module.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct LaunchConfig {
    #[validate(length(min = 1))]
    pub model_path: String,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub random_seed: u64,
    #[validate(range(min = 1))]
    pub tensor_parallel_size: u32,
    #[validate(length(min = 1))]
    pub dtype: String,
    #[validate(range(min = 1))]
    pub context_length: u32,
    #[validate(length(min = 1))]
    pub reasoning_parser: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            model_path: "Qwen/Qwen3-4B-AWQ".to_string(),
            host: "0.0.0.0".to_string(),
            port: 30000,
            random_seed: 1337,
            tensor_parallel_size: 1,
            dtype: "bfloat16".to_string(),
            context_length: 16384,
            reasoning_parser: "qwen3".to_string(),
        }
    }
}

impl LaunchConfig {
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--model-path".to_string(),
            self.model_path.clone(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--random-seed".to_string(),
            self.random_seed.to_string(),
            "--tensor-parallel-size".to_string(),
            self.tensor_parallel_size.to_string(),
            "--dtype".to_string(),
            self.dtype.clone(),
            "--context-length".to_string(),
            self.context_length.to_string(),
            "--reasoning-parser".to_string(),
            self.reasoning_parser.clone(),
        ]
    }

    /// Address a client on the same machine uses to reach the server.
    pub fn local_base_url(&self) -> String {
        let host = if self.host == "0.0.0.0" { "localhost" } else { self.host.as_str() };
        format!("http://{}:{}", host, self.port)
    }
}

/// Installs the serving runtime and runs the model server in the foreground.
///
/// Every step must succeed before the next one starts; the first failure
/// ends the run and the server is never started after a failed install.
#[derive(Debug, Clone)]
pub struct ServerLauncher {
    python: String,
    module: String,
    install_packages: Vec<String>,
    config: LaunchConfig,
}

impl ServerLauncher {
    pub fn new(settings: &ServeSettings, config: LaunchConfig) -> Self {
        Self {
            python: settings.python.clone(),
            module: settings.module.clone(),
            install_packages: settings.install_packages.clone(),
            config,
        }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn install_args(&self, package: &str) -> Vec<String> {
        ["-m", "pip", "install", package].iter().map(|s| s.to_string()).collect()
    }

    pub fn server_args(&self) -> Vec<String> {
        let mut args = vec!["-m".to_string(), self.module.clone()];
        args.extend(self.config.to_args());
        args
    }

    pub fn command_line(&self) -> String {
        let mut parts = vec![self.python.clone()];
        parts.extend(self.server_args());
        parts.join(" ")
    }

    pub async fn install_runtime(&self) -> Result<(), LaunchError> {
        for package in &self.install_packages {
            info!("Installing {}", package);
            let status = Command::new(&self.python)
                .args(self.install_args(package))
                .status()
                .await
                .map_err(|source| LaunchError::Spawn {
                    program: self.python.clone(),
                    source,
                })?;

            if !status.success() {
                error!("Install of {} failed: {}", package, status);
                return Err(LaunchError::InstallFailed {
                    package: package.clone(),
                    status,
                });
            }
        }
        Ok(())
    }

    pub async fn launch(&self) -> Result<(), LaunchError> {
        self.config.validate()?;
        info!("Starting model server: {}", self.command_line());

        let mut child = Command::new(&self.python)
            .args(self.server_args())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: self.python.clone(),
                source,
            })?;

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::signal::ctrl_c() => None,
        };

        let status = match waited {
            Some(status) => status.map_err(|source| LaunchError::Spawn {
                program: self.python.clone(),
                source,
            })?,
            None => {
                warn!("Interrupted, stopping model server");
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop model server: {}", e);
                }
                return Ok(());
            }
        };

        if status.success() {
            info!("Model server exited");
            Ok(())
        } else {
            Err(LaunchError::ServerExited(status))
        }
    }

    pub async fn run(&self, skip_install: bool) -> Result<(), LaunchError> {
        self.config.validate()?;
        if !skip_install {
            self.install_runtime().await?;
        }
        self.launch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(python: &str, packages: &[&str]) -> ServeSettings {
        ServeSettings {
            python: python.to_string(),
            module: "sglang.launch_server".to_string(),
            install_packages: packages.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn default_flags_match_the_deployment() {
        let args = LaunchConfig::default().to_args();
        assert_eq!(
            args,
            vec![
                "--model-path", "Qwen/Qwen3-4B-AWQ",
                "--host", "0.0.0.0",
                "--port", "30000",
                "--random-seed", "1337",
                "--tensor-parallel-size", "1",
                "--dtype", "bfloat16",
                "--context-length", "16384",
                "--reasoning-parser", "qwen3",
            ]
        );
    }

    #[test]
    fn command_line_runs_the_module_with_python() {
        let launcher = ServerLauncher::new(&settings("python3", &[]), LaunchConfig::default());
        let line = launcher.command_line();
        assert!(line.starts_with("python3 -m sglang.launch_server --model-path Qwen/Qwen3-4B-AWQ"));
        assert!(line.ends_with("--reasoning-parser qwen3"));
        assert_eq!(launcher.install_args("pkg==1.0"), vec!["-m", "pip", "install", "pkg==1.0"]);
    }

    #[test]
    fn local_base_url_replaces_wildcard_host() {
        assert_eq!(LaunchConfig::default().local_base_url(), "http://localhost:30000");
        let config = LaunchConfig { host: "10.0.0.5".to_string(), ..LaunchConfig::default() };
        assert_eq!(config.local_base_url(), "http://10.0.0.5:30000");
    }

    #[test]
    fn validation_rejects_zero_parallelism_and_empty_model() {
        assert!(LaunchConfig::default().validate().is_ok());

        let config = LaunchConfig { tensor_parallel_size: 0, ..LaunchConfig::default() };
        assert!(config.validate().is_err());

        let config = LaunchConfig { model_path: String::new(), ..LaunchConfig::default() };
        assert!(config.validate().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_install_stops_before_the_server_starts() {
        let launcher = ServerLauncher::new(&settings("false", &["first==1.0", "second==2.0"]), LaunchConfig::default());
        match launcher.run(false).await {
            Err(LaunchError::InstallFailed { package, .. }) => assert_eq!(package, "first==1.0"),
            other => panic!("expected install failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_server_exit_is_reported() {
        let launcher = ServerLauncher::new(&settings("false", &[]), LaunchConfig::default());
        assert!(matches!(launcher.run(true).await, Err(LaunchError::ServerExited(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_server_exit_is_ok() {
        let launcher = ServerLauncher::new(&settings("true", &["ignored==0.1"]), LaunchConfig::default());
        assert!(launcher.run(false).await.is_ok());
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_spawn_error() {
        let launcher = ServerLauncher::new(&settings("definitely-not-a-python-binary", &[]), LaunchConfig::default());
        assert!(matches!(launcher.launch().await, Err(LaunchError::Spawn { .. })));
    }
}
