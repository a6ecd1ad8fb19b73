use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for Tidepool
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteOverride>,
}

/// Process-wide pipeline defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// User agent sent with every request and matched against robots.txt groups
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum spacing between requests to the same domain (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Maximum concurrent in-flight requests per domain
    #[serde(default = "default_concurrency")]
    pub default_concurrency: u32,

    /// Maximum in-flight requests across all domains
    #[serde(default = "default_global_concurrency")]
    pub global_concurrency: u32,

    /// Whether a robots.txt Crawl-delay may raise a domain's spacing
    #[serde(default = "default_true")]
    pub respect_crawl_delay: bool,
}

impl PipelineConfig {
    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            default_delay_ms: default_delay_ms(),
            default_concurrency: default_concurrency(),
            global_concurrency: default_global_concurrency(),
            respect_crawl_delay: true,
        }
    }
}

/// Decision used when a domain's robots.txt cannot be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreachablePolicy {
    /// Treat the domain as allowing everything
    #[default]
    Permissive,
    /// Treat the domain as disallowing everything
    Restrictive,
}

/// Robots.txt evaluation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RobotsConfig {
    /// Freshness window for a successfully fetched policy (seconds)
    #[serde(default = "default_robots_ttl_secs")]
    pub ttl_secs: u64,

    /// Freshness window for a fallback policy after a failed fetch (seconds)
    #[serde(default = "default_fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,

    /// Timeout for the robots.txt request (milliseconds)
    #[serde(default = "default_robots_timeout_ms")]
    pub timeout_ms: u64,

    /// Decision applied when robots.txt is unreachable or malformed
    #[serde(default)]
    pub on_unreachable: UnreachablePolicy,
}

impl RobotsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_robots_ttl_secs(),
            fallback_ttl_secs: default_fallback_ttl_secs(),
            timeout_ms: default_robots_timeout_ms(),
            on_unreachable: UnreachablePolicy::default(),
        }
    }
}

/// Retry-with-backoff settings shared by every downloader
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Plain HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// Headless browser settings for script-rendered sites
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    #[serde(default = "default_browser_timeout_secs")]
    pub timeout_secs: u64,

    /// How long the document must stay unchanged before it counts as settled
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// Explicit Chrome/Chromium binary; auto-detected when absent
    #[serde(default)]
    pub chrome_executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_browser_timeout_secs(),
            quiet_period_ms: default_quiet_period_ms(),
            chrome_executable: None,
        }
    }
}

/// PDF extraction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PdfConfig {
    /// Pages with fewer non-whitespace characters per square inch go to OCR
    #[serde(default = "default_min_text_density")]
    pub min_text_density: f64,

    #[serde(default = "default_true")]
    pub ocr: bool,

    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_density: default_min_text_density(),
            ocr: true,
            ocr_dpi: default_ocr_dpi(),
        }
    }
}

/// How a site's content must be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderingMode {
    /// Plain HTTP is enough
    #[default]
    Static,
    /// Content only exists after client-side scripts run
    Scripted,
}

/// Per-domain overrides (e.g. "sec.gov" or "*.europa.eu")
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteOverride {
    pub domain: String,

    #[serde(default)]
    pub delay_ms: Option<u64>,

    #[serde(default)]
    pub concurrency: Option<u32>,

    #[serde(default)]
    pub rendering: RenderingMode,
}

impl SiteOverride {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            delay_ms: None,
            concurrency: None,
            rendering: RenderingMode::Static,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_rendering(mut self, rendering: RenderingMode) -> Self {
        self.rendering = rendering;
        self
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }
}

fn default_user_agent() -> String {
    format!(
        "Tidepool/{} (+https://github.com/tidepool-rs/tidepool)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_concurrency() -> u32 {
    2
}

fn default_global_concurrency() -> u32 {
    12
}

fn default_true() -> bool {
    true
}

fn default_robots_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_fallback_ttl_secs() -> u64 {
    60 * 60
}

fn default_robots_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    10
}

fn default_browser_timeout_secs() -> u64 {
    45
}

fn default_quiet_period_ms() -> u64 {
    500
}

fn default_min_text_density() -> f64 {
    1.0
}

fn default_ocr_dpi() -> u32 {
    300
}
