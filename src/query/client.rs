use super::protocol::{ENDPOINT_STATE_VALUE, StatsResponse};
use crate::routing::metadata::HostStoreInfo;

use anyhow::Result;
use std::time::Duration;

/// HTTP client for the query routes of other instances.
#[derive(Clone)]
pub struct RemoteStateClient {
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl Default for RemoteStateClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 3)
    }
}

impl RemoteStateClient {
    pub fn new(timeout: Duration, attempts: usize) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
            attempts: attempts.max(1),
        }
    }

    /// `/state/value` of `host`. `None` when the store has no representative there.
    pub async fn fetch_value(&self, host: &HostStoreInfo) -> Result<Option<StatsResponse>> {
        let url = format!("{}{}", host.base_url(), ENDPOINT_STATE_VALUE);
        let response = self.get_with_retry(url).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("GET request failed {}", response.status()));
        }

        let stats: StatsResponse = response.json().await?;
        Ok(Some(stats))
    }

    async fn get_with_retry(&self, url: String) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http_client
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    tracing::debug!("GET {} failed (attempt {}): {}", url, attempt + 1, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }
}
