use crate::config::SiteOverride;

/// Checks if a domain matches a site pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: "sec.gov" matches only "sec.gov"
/// 2. Wildcard: "*.europa.eu" matches "europa.eu" and any subdomain of it
///
/// Both sides are expected to be lowercase already.
///
/// # Examples
///
/// ```
/// use tidepool::url::matches_wildcard;
///
/// assert!(matches_wildcard("sec.gov", "sec.gov"));
/// assert!(!matches_wildcard("sec.gov", "www.sec.gov"));
/// assert!(matches_wildcard("*.europa.eu", "ec.europa.eu"));
/// assert!(!matches_wildcard("*.europa.eu", "noteuropa.eu"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base
            || candidate
                .strip_suffix(base)
                .is_some_and(|prefix| prefix.ends_with('.'))
    } else {
        candidate == pattern
    }
}

/// Finds the site override that applies to `domain`
///
/// An exact pattern always beats a wildcard; among matching wildcards the one
/// with the longest base wins, so `*.fda.hhs.gov` beats `*.hhs.gov`.
pub fn find_site_override<'a>(sites: &'a [SiteOverride], domain: &str) -> Option<&'a SiteOverride> {
    if let Some(exact) = sites.iter().find(|site| site.domain == domain) {
        return Some(exact);
    }

    sites
        .iter()
        .filter(|site| site.domain.starts_with("*.") && matches_wildcard(&site.domain, domain))
        .max_by_key(|site| site.domain.len())
}
