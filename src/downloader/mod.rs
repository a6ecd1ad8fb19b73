//! Download strategies
//!
//! Two strategies share one contract: [`HttpDownloader`] for ordinary sites
//! and [`BrowserDownloader`] for sites whose content only exists after
//! client-side scripts run. Both wrap every transfer in
//! [`retry_with_backoff`]; [`DownloaderSelector`] picks one per URL.

mod browser;
mod http;
mod retry;

pub use browser::BrowserDownloader;
pub use http::{build_http_client, HttpDownloader};
pub use retry::{retry_with_backoff, RetryPolicy};

use crate::config::{RenderingMode, SiteOverride};
use crate::url::{extract_domain, find_site_override};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Raw bytes of a fetched resource plus response facts
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub content: Vec<u8>,

    /// Declared Content-Type header, if any
    pub content_type: Option<String>,

    pub source_url: String,

    /// URL after redirects
    pub final_url: String,

    pub status_code: u16,
}

impl DownloadResult {
    /// MIME type of the declared content type, lowercased and without parameters
    ///
    /// ```
    /// use tidepool::DownloadResult;
    ///
    /// let result = DownloadResult {
    ///     content: Vec::new(),
    ///     content_type: Some("Application/PDF; charset=binary".to_string()),
    ///     source_url: "https://example.org/a".to_string(),
    ///     final_url: "https://example.org/a".to_string(),
    ///     status_code: 200,
    /// };
    /// assert_eq!(result.mime_type().as_deref(), Some("application/pdf"));
    /// ```
    pub fn mime_type(&self) -> Option<String> {
        let raw = self.content_type.as_deref()?;
        let mime = raw.split(';').next().unwrap_or_default().trim().to_lowercase();
        (!mime.is_empty()).then_some(mime)
    }

    /// Final URL parsed, falling back to the source URL
    pub fn url(&self) -> Option<Url> {
        Url::parse(&self.final_url)
            .or_else(|_| Url::parse(&self.source_url))
            .ok()
    }
}

/// Failure to obtain a resource
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {reason}")]
    Network {
        url: String,
        reason: String,
        transient: bool,
    },

    #[error("Browser error for {url}: {reason}")]
    Browser {
        url: String,
        reason: String,
        transient: bool,
    },
}

impl DownloadError {
    /// Returns true if another attempt might succeed
    ///
    /// Server errors (5xx), timeouts, and transient network or browser
    /// failures are retryable. Client errors (4xx, including 429) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => (500..600).contains(status),
            Self::Timeout { .. } => true,
            Self::Network { transient, .. } | Self::Browser { transient, .. } => *transient,
        }
    }

    /// HTTP status code, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A fetch strategy
#[async_trait]
pub trait Downloader: Send + Sync + std::fmt::Debug {
    /// Short name recorded in result metadata ("http", "browser")
    fn name(&self) -> &'static str;

    /// Fetches `url`, retrying transient failures
    async fn download(&self, url: &Url) -> Result<DownloadResult, DownloadError>;
}

/// Picks a downloader per URL from the site overrides
#[derive(Debug, Clone)]
pub struct DownloaderSelector {
    http: Arc<dyn Downloader>,
    browser: Arc<dyn Downloader>,
    sites: Vec<SiteOverride>,
}

impl DownloaderSelector {
    pub fn new(
        http: Arc<dyn Downloader>,
        browser: Arc<dyn Downloader>,
        sites: Vec<SiteOverride>,
    ) -> Self {
        Self {
            http,
            browser,
            sites,
        }
    }

    /// Returns the browser strategy for scripted sites, the HTTP one otherwise
    pub fn select(&self, url: &Url) -> Arc<dyn Downloader> {
        let scripted = extract_domain(url)
            .and_then(|domain| find_site_override(&self.sites, &domain))
            .is_some_and(|site| site.rendering == RenderingMode::Scripted);

        if scripted {
            Arc::clone(&self.browser)
        } else {
            Arc::clone(&self.http)
        }
    }
}
