//! Plain HTTP download strategy
//!
//! This module handles direct HTTP requests:
//! - Building HTTP clients with our user agent and timeouts
//! - GET requests that buffer the body in memory
//! - Redirect following (bounded)
//! - Error classification for the retry wrapper

use super::{retry_with_backoff, DownloadError, DownloadResult, Downloader, RetryPolicy};
use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use tidepool::config::HttpConfig;
/// use tidepool::downloader::build_http_client;
///
/// let client = build_http_client("Tidepool/0.1", &HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches resources with a plain GET request
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    retry: RetryPolicy,
}

impl HttpDownloader {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn fetch_once(&self, url: &Url) -> Result<DownloadResult, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let content = response.bytes().await.map_err(|e| classify(url, e))?;

        Ok(DownloadResult {
            content: content.to_vec(),
            content_type,
            source_url: url.to_string(),
            final_url,
            status_code: status.as_u16(),
        })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn download(&self, url: &Url) -> Result<DownloadResult, DownloadError> {
        let result = retry_with_backoff(&self.retry, DownloadError::is_retryable, move |attempt| {
            tracing::debug!("GET {} (attempt {})", url, attempt);
            self.fetch_once(url)
        })
        .await;

        match &result {
            Ok(download) => tracing::info!(
                "Downloaded {} ({} bytes, {})",
                url,
                download.content.len(),
                download.content_type.as_deref().unwrap_or("no content type")
            ),
            Err(e) => tracing::warn!("Download failed: {}", e),
        }
        result
    }
}

/// Maps a reqwest error onto the download error taxonomy
fn classify(url: &Url, error: reqwest::Error) -> DownloadError {
    let url = url.to_string();

    if error.is_timeout() {
        return DownloadError::Timeout { url };
    }

    if let Some(status) = error.status() {
        return DownloadError::Status {
            url,
            status: status.as_u16(),
        };
    }

    // Redirect loops and bad request construction won't fix themselves
    let transient = !(error.is_redirect() || error.is_builder());

    DownloadError::Network {
        url,
        reason: error.to_string(),
        transient,
    }
}
