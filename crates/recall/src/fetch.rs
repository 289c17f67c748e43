//! Bookmarked-page fetching.
//!
//! [`PageFetcher`] is the seam between the ingestion engine and the
//! network; integration tests substitute a static fetcher. The real
//! [`HttpFetcher`] carries a per-request timeout so one dead host cannot
//! stall a sync run.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body as text.
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("recall/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} fetching {}", status, url);
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body: {}", url))?;
        Ok(body)
    }
}
