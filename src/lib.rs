//! Tidepool: a compliance-aware document harvester
//!
//! This crate fetches remote documents (PDF, DOCX/DOC, HTML, RSS/Atom) while
//! honouring robots.txt and per-domain rate limits, and converts them into
//! normalized text plus metadata.
//!
//! The flow is strictly downstream:
//! compliance gate → downloader selection → download → extractor selection → extract.

pub mod compliance;
pub mod config;
pub mod downloader;
pub mod extractor;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod throttle;
pub mod url;

use thiserror::Error;

pub use downloader::DownloadError;
pub use extractor::ExtractionError;

/// Main error type for Tidepool operations
#[derive(Debug, Error)]
pub enum TidepoolError {
    #[error("URL disallowed by robots.txt: {url}")]
    PolicyDenied { url: String },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("No extractor for {url} (content type: {})", .content_type.as_deref().unwrap_or("none"))]
    UnsupportedFormat {
        url: String,
        content_type: Option<String>,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat discriminator over [`TidepoolError`] for callers that only need to
/// decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PolicyDenied,
    Download,
    UnsupportedFormat,
    Extraction,
    Config,
    Input,
}

impl ErrorKind {
    /// Short description of what the caller should do about this kind of failure
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::PolicyDenied => "skip: the site forbids automated access to this path",
            Self::Download => "retry later: network or server problem",
            Self::UnsupportedFormat => "report: no extractor for this format",
            Self::Extraction => "report: content is malformed for its format",
            Self::Config => "fix the configuration",
            Self::Input => "fix the input URL",
        }
    }
}

impl TidepoolError {
    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            Self::Download(_) => ErrorKind::Download,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Config(_) => ErrorKind::Config,
            Self::Url(_) | Self::Io(_) => ErrorKind::Input,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Tidepool operations
pub type Result<T> = std::result::Result<T, TidepoolError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use downloader::DownloadResult;
pub use extractor::{ExtractionResult, MetadataValue};
pub use pipeline::Pipeline;
