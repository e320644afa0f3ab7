//! Existence checks for candidate URLs

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Checks whether a URL currently serves a file
///
/// Implementations must not download the body. An `Err` is treated by the
/// resolver exactly like `Ok(false)`.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    /// `true` if the URL is reachable and answers with a success status
    async fn probe(&self, url: &str) -> Result<bool>;
}

/// Probe sending an HTTP `HEAD` request
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Create a probe whose requests give up after `timeout`
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<bool> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().is_success())
    }
}
