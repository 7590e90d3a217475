use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;

use crate::errors::{BootstrapError, Result};

/// JSON client for the client settings API. Every request is bounded by the configured
/// timeout and retried with backoff while the failure looks transient.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: usize,
}

impl ApiClient {
    pub fn new(base_url: String, timeout: Duration, max_retries: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            max_retries,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        (|| self.fetch_json::<T>(&url))
            .retry(retry_strategy(self.max_retries))
            .when(|err| err.is_retryable())
            .notify(|err, delay| {
                tracing::warn!("request to {} failed ({}), retrying in {:?}", url, err, delay);
            })
            .await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::Http {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await?;
        let value = serde_json::from_str::<T>(&body)?;
        Ok(value)
    }
}

pub fn retry_strategy(max_retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(4))
        .with_max_times(max_retries)
}
