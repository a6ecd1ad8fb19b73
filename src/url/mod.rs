//! URL handling module for Tidepool
//!
//! This module provides target validation, domain extraction, site-override
//! matching, and syndication feed recognition.

mod domain;
mod feed;
mod matcher;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use domain::{domain_key, extract_domain, robots_url};
pub use feed::is_feed_url;
pub use matcher::{find_site_override, matches_wildcard};

/// Parses and validates a target URL
///
/// Only absolute `http`/`https` URLs with a host are accepted.
///
/// # Examples
///
/// ```
/// use tidepool::url::parse_target;
///
/// assert!(parse_target("https://example.org/report.pdf").is_ok());
/// assert!(parse_target("ftp://example.org/report.pdf").is_err());
/// assert!(parse_target("/relative/path").is_err());
/// ```
pub fn parse_target(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Returns the lowercase file extension of the URL path, if any
///
/// ```
/// use url::Url;
/// use tidepool::url::path_extension;
///
/// let url = Url::parse("https://example.org/files/Report.PDF?dl=1").unwrap();
/// assert_eq!(path_extension(&url), Some("pdf".to_string()));
/// ```
pub fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
