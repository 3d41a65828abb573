use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::info;

use super::ImageTransformer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Forwards images to a cartoonifier service over HTTP.
pub struct RemoteCartoonifier {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteCartoonifier {
    pub fn new(endpoint: String) -> Result<Self> {
        info!("Using remote cartoonifier at {}", endpoint);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ImageTransformer for RemoteCartoonifier {
    async fn transform(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Cartoonifier request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Cartoonifier responded with status: {}",
                response.status()
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read cartoonifier response: {}", e))?;

        Ok(bytes.to_vec())
    }
}
