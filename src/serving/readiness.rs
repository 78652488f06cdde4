use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use reqwest::Client;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls `<base_url>/health` until the server answers 2xx or `timeout` passes.
pub async fn wait_until_ready(base_url: &str, timeout: Duration) -> Result<Duration> {
    wait_until_ready_with(base_url, timeout, POLL_INTERVAL).await
}

pub async fn wait_until_ready_with(base_url: &str, timeout: Duration, interval: Duration) -> Result<Duration> {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let started = Instant::now();
    loop {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("Model server ready at {}", base_url);
                return Ok(started.elapsed());
            }
            Ok(response) => log::debug!("Health check returned {}", response.status()),
            Err(e) => log::debug!("Health check failed: {}", e),
        }

        if started.elapsed() + interval > timeout {
            return Err(anyhow!(
                "Model server at {} not ready after {}s",
                base_url,
                timeout.as_secs()
            ));
        }
        tokio::time::sleep(interval).await;
    }
}
