use super::path_extension;
use url::Url;

/// Path suffixes that identify a syndication feed on their own
const FEED_SUFFIXES: &[&str] = &[".rss", ".atom"];

/// Path segments that mark a feed endpoint (`/feed`, `/news/rss/`, ...)
const FEED_SEGMENTS: &[&str] = &["feed", "feeds", "rss", "atom"];

/// Extensions of documents that are never feeds, whatever their path says
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "htm", "html", "xhtml"];

/// Returns true if the URL points at an RSS/Atom feed
///
/// Feeds are a discovery mechanism a site publishes on purpose, so they are
/// exempt from robots.txt (they still go through the domain throttle). A feed
/// segment only counts as the endpoint itself (`/news/rss`) or as the parent
/// of an XML file (`/rss/news.xml`). Anything else below it is an ordinary
/// page and stays subject to robots.txt.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tidepool::url::is_feed_url;
///
/// assert!(is_feed_url(&Url::parse("https://www.fda.gov/news/feed").unwrap()));
/// assert!(is_feed_url(&Url::parse("https://example.org/updates.rss").unwrap()));
/// assert!(!is_feed_url(&Url::parse("https://example.org/feedback").unwrap()));
/// assert!(!is_feed_url(&Url::parse("https://example.org/rss/archive/report.pdf").unwrap()));
/// ```
pub fn is_feed_url(url: &Url) -> bool {
    if path_extension(url).is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str())) {
        return false;
    }

    let path = url.path().to_lowercase();
    if FEED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        return true;
    }

    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    match segments.as_slice() {
        [.., last] if is_feed_segment(last) => true,
        [.., parent, last] => FEED_SEGMENTS.contains(parent) && last.ends_with(".xml"),
        _ => false,
    }
}

/// `feed`, `rss`, ... on their own or as `rss.xml`
fn is_feed_segment(segment: &str) -> bool {
    let name = segment.strip_suffix(".xml").unwrap_or(segment);
    FEED_SEGMENTS.contains(&name)
}
