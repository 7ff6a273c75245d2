//! Text fetching for frame documents and script resources.
//!
//! [`Fetcher`] is the seam the extractor and frame loader fetch through.
//! [`HttpClient`] wraps reqwest with retry on 5xx and backoff on 429;
//! [`OfflineFetcher`] refuses every request and is used when a document is
//! inspected without network access.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{GrabError, GrabResult};

/// Body of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedText {
    /// Requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub body: String,
}

/// Source of text resources (HTML documents, script bodies).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL and return its body. Non-success statuses are errors.
    async fn fetch_text(&self, url: &str) -> GrabResult<FetchedText>;
}

/// Fetcher that never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch_text(&self, url: &str) -> GrabResult<FetchedText> {
        Err(GrabError::Fetch(format!("network disabled: {url}")))
    }
}

/// HTTP client used for frame documents and external scripts.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for servers that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpClient {
    /// Create a client with a desktop browser user-agent.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";
        let timeout = Duration::from_millis(timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout,
            max_retries: 2,
        }
    }

    /// Disable or limit retries on 5xx/429/transport errors.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET with retries, falling back to HTTP/1.1 on protocol errors.
    pub async fn get(&self, url: &str) -> GrabResult<FetchedText> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(GrabError::Http(e)) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    tracing::debug!("retrying {url} over HTTP/1.1: {err_str}");
                    self.get_inner(&self.h1_client, url).await
                } else {
                    Err(GrabError::Http(e))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> GrabResult<FetchedText> {
        let mut retries = 0u32;

        loop {
            let resp = client.get(url).timeout(self.timeout).send().await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    if !(200..300).contains(&status) {
                        return Err(GrabError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }

                    let final_url = r.url().to_string();
                    let body = r.text().await?;
                    return Ok(FetchedText {
                        url: url.to_string(),
                        final_url,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries && !e.is_timeout() {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> GrabResult<FetchedText> {
        self.get(url).await
    }
}
