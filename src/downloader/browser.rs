//! Headless browser download strategy for script-rendered sites

use super::{retry_with_backoff, DownloadError, DownloadResult, Downloader, RetryPolicy};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A running browser and the task driving its CDP connection
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Loads pages in headless Chrome and captures the rendered document
///
/// The browser is launched on first use and shared by every download made
/// through this instance.
pub struct BrowserDownloader {
    config: BrowserConfig,
    user_agent: String,
    retry: RetryPolicy,
    session: OnceCell<BrowserSession>,
}

impl std::fmt::Debug for BrowserDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserDownloader")
            .field("config", &self.config)
            .field("launched", &self.session.initialized())
            .finish()
    }
}

impl BrowserDownloader {
    pub fn new(config: BrowserConfig, user_agent: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            config,
            user_agent: user_agent.into(),
            retry,
            session: OnceCell::new(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn session(&self, url: &Url) -> Result<&BrowserSession, DownloadError> {
        self.session
            .get_or_try_init(|| async {
                let mut builder = LaunchConfig::builder()
                    .request_timeout(self.timeout())
                    .arg(format!("--user-agent={}", self.user_agent))
                    .arg("--disable-gpu")
                    .arg("--no-first-run")
                    .arg("--mute-audio");

                if let Some(path) = &self.config.chrome_executable {
                    builder = builder.chrome_executable(path);
                }

                let launch = builder.build().map_err(|reason| DownloadError::Browser {
                    url: url.to_string(),
                    reason,
                    transient: false,
                })?;

                let (browser, mut handler) =
                    Browser::launch(launch)
                        .await
                        .map_err(|e| DownloadError::Browser {
                            url: url.to_string(),
                            reason: format!("launch failed: {}", e),
                            transient: false,
                        })?;

                let handler = tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if let Err(e) = event {
                            tracing::debug!("Browser handler error: {:?}", e);
                        }
                    }
                });

                tracing::info!("Launched headless browser");
                Ok(BrowserSession { browser, handler })
            })
            .await
    }

    async fn fetch_once(&self, url: &Url) -> Result<DownloadResult, DownloadError> {
        let session = self.session(url).await?;

        let page = session
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| browser_error(url, e))?;

        let rendered = tokio::time::timeout(self.timeout(), self.render(&page, url)).await;

        // Page is closed on every path; a close failure only leaks a tab
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }

        rendered.unwrap_or_else(|_| {
            Err(DownloadError::Timeout {
                url: url.to_string(),
            })
        })
    }

    async fn render(&self, page: &Page, url: &Url) -> Result<DownloadResult, DownloadError> {
        let navigation = page
            .wait_for_navigation_response()
            .await
            .map_err(|e| browser_error(url, e))?;
        let reported = navigation
            .as_ref()
            .and_then(|request| request.response.as_ref())
            .map(|response| response.status);
        let status_code = document_status(url, reported)?;

        self.wait_for_quiescence(page, url).await?;

        let html = page.content().await.map_err(|e| browser_error(url, e))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(DownloadResult {
            content: html.into_bytes(),
            content_type: Some("text/html".to_string()),
            source_url: url.to_string(),
            final_url,
            status_code,
        })
    }

    /// Waits until the document is loaded and its size stops changing
    async fn wait_for_quiescence(&self, page: &Page, url: &Url) -> Result<(), DownloadError> {
        let quiet_period = Duration::from_millis(self.config.quiet_period_ms);
        let mut last_size: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            let ready: String = page
                .evaluate("document.readyState")
                .await
                .map_err(|e| browser_error(url, e))?
                .into_value()
                .unwrap_or_default();

            let size: u64 = page
                .evaluate("document.documentElement ? document.documentElement.outerHTML.length : 0")
                .await
                .map_err(|e| browser_error(url, e))?
                .into_value()
                .unwrap_or_default();

            if last_size != Some(size) {
                last_size = Some(size);
                stable_since = Instant::now();
            } else if ready == "complete" && stable_since.elapsed() >= quiet_period {
                tracing::debug!("{} settled at {} bytes", url, size);
                return Ok(());
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Downloader for BrowserDownloader {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn download(&self, url: &Url) -> Result<DownloadResult, DownloadError> {
        let result = retry_with_backoff(&self.retry, DownloadError::is_retryable, move |attempt| {
            tracing::debug!("Rendering {} (attempt {})", url, attempt);
            self.fetch_once(url)
        })
        .await;

        match &result {
            Ok(download) => tracing::info!(
                "Rendered {} ({} bytes)",
                url,
                download.content.len()
            ),
            Err(e) => tracing::warn!("Render failed: {}", e),
        }
        result
    }
}

/// Applies the HTTP downloader's status rule to the main document response
///
/// A navigation with no recorded response (served from cache, or a scheme
/// without status codes) counts as 200.
fn document_status(url: &Url, reported: Option<i64>) -> Result<u16, DownloadError> {
    let status = reported
        .filter(|status| *status > 0)
        .and_then(|status| u16::try_from(status).ok())
        .unwrap_or(200);

    if (200..300).contains(&status) {
        Ok(status)
    } else {
        tracing::warn!("HTTP {} rendering {}", status, url);
        Err(DownloadError::Status {
            url: url.to_string(),
            status,
        })
    }
}

fn browser_error(url: &Url, error: chromiumoxide::error::CdpError) -> DownloadError {
    use chromiumoxide::error::CdpError;

    match error {
        CdpError::Timeout => DownloadError::Timeout {
            url: url.to_string(),
        },
        other => DownloadError::Browser {
            url: url.to_string(),
            reason: other.to_string(),
            transient: true,
        },
    }
}
