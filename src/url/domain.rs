use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host without any port. This is the key used for
/// site-override lookup.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tidepool::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the key under which per-domain state (crawl policy, throttle) is kept
///
/// This is the lowercase host plus the port when it is not the scheme's
/// default, so two services on one host never share robots.txt or spacing.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tidepool::url::domain_key;
///
/// let url = Url::parse("http://127.0.0.1:8080/doc.pdf").unwrap();
/// assert_eq!(domain_key(&url), Some("127.0.0.1:8080".to_string()));
///
/// let url = Url::parse("https://Example.org:443/").unwrap();
/// assert_eq!(domain_key(&url), Some("example.org".to_string()));
/// ```
pub fn domain_key(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Builds the well-known robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    let mut robots = url.clone();
    robots.host_str()?;
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    // Credentials never belong in a robots.txt request
    let _ = robots.set_username("");
    let _ = robots.set_password(None);
    Some(robots)
}
