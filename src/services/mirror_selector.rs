use std::time::Duration;

use crate::errors::{BootstrapError, Result};

/// Picks the first reachable content origin from an ordered candidate list.
#[derive(Clone)]
pub struct MirrorSelector {
    client: reqwest::Client,
    candidates: Vec<String>,
}

impl MirrorSelector {
    pub fn new(candidates: Vec<String>, probe_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .connect_timeout(probe_timeout)
            .build()?;
        Ok(Self { client, candidates })
    }

    /// Probes candidates in order. Exhaustion is returned to the caller rather than aborting.
    pub async fn select(&self) -> Result<String> {
        for origin in &self.candidates {
            match self.probe(origin).await {
                Ok(()) => {
                    tracing::info!("using mirror {}", origin);
                    return Ok(origin.trim_end_matches('/').to_string());
                }
                Err(err) => {
                    tracing::warn!("mirror {} unreachable: {}", origin, err);
                }
            }
        }

        Err(BootstrapError::NoMirrorAvailable {
            tried: self.candidates.clone(),
        })
    }

    // Any HTTP answer proves the origin is up; CDN roots commonly answer 403/404.
    async fn probe(&self, origin: &str) -> Result<()> {
        let response = self.client.get(origin).send().await?;
        tracing::debug!("probe {} -> {}", origin, response.status());
        Ok(())
    }
}
