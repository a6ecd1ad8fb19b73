//! Crawl policy caching
//!
//! Each domain's robots.txt is parsed once into a [`CrawlPolicy`] and kept in
//! the [`ComplianceCache`] until its TTL runs out.

use crate::robots::ParsedRules;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Where a policy's rules came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOrigin {
    /// Parsed from a robots.txt the site served
    Fetched,

    /// Default applied because robots.txt was unreachable or unusable
    Fallback,
}

/// A domain's crawl policy with its expiry bookkeeping
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
    /// Allow and disallow patterns plus any Crawl-delay
    pub rules: ParsedRules,

    /// When the policy was created
    pub fetched_at: DateTime<Utc>,

    /// How long the policy stays fresh
    pub ttl: Duration,

    pub origin: PolicyOrigin,
}

impl CrawlPolicy {
    /// Creates a policy from robots.txt rules the site served
    pub fn fetched(rules: ParsedRules, ttl: Duration) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
            ttl,
            origin: PolicyOrigin::Fetched,
        }
    }

    /// Creates a default policy used when robots.txt could not be obtained
    pub fn fallback(rules: ParsedRules, ttl: Duration) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
            ttl,
            origin: PolicyOrigin::Fallback,
        }
    }

    /// True once the policy has outlived its TTL at `now`
    ///
    /// # Arguments
    ///
    /// * `now` - The instant to judge freshness at, usually `Utc::now()`
    ///
    /// # Returns
    ///
    /// `true` when more than `ttl` has passed since `fetched_at`. A TTL too
    /// large to represent never expires.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - self.fetched_at > ttl,
            Err(_) => false,
        }
    }

    /// Checks a path (plus query) against the policy
    pub fn is_allowed(&self, path: &str) -> bool {
        self.rules.is_allowed(path)
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.rules.crawl_delay
    }
}

/// Per-domain crawl policies shared by all in-flight requests
///
/// Reads and writes never hold a lock across an await point; a domain whose
/// policy is missing may be fetched by two callers at once and the later
/// insert simply wins.
#[derive(Debug, Default)]
pub struct ComplianceCache {
    entries: DashMap<String, Arc<CrawlPolicy>>,
}

impl ComplianceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached policy for `domain`, stale or not
    pub fn get(&self, domain: &str) -> Option<Arc<CrawlPolicy>> {
        self.entries.get(domain).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the cached policy for `domain` if it is still fresh at `now`
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain key as produced by [`crate::url::domain_key`]
    /// * `now` - The instant to judge freshness at
    ///
    /// # Returns
    ///
    /// * `Some(policy)` - A cached policy that has not outlived its TTL
    /// * `None` - Nothing cached, or the cached policy is stale
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::Utc;
    /// use std::time::Duration;
    /// use tidepool::robots::{ComplianceCache, CrawlPolicy, ParsedRules};
    ///
    /// let cache = ComplianceCache::new();
    /// let policy = CrawlPolicy::fetched(ParsedRules::disallow_all(), Duration::from_secs(60));
    /// cache.insert("example.org", policy);
    ///
    /// let fresh = cache.get_fresh("example.org", Utc::now()).unwrap();
    /// assert!(!fresh.is_allowed("/reports/"));
    ///
    /// let later = Utc::now() + chrono::Duration::seconds(120);
    /// assert!(cache.get_fresh("example.org", later).is_none());
    /// assert!(cache.get("example.org").is_some());
    /// ```
    pub fn get_fresh(&self, domain: &str, now: DateTime<Utc>) -> Option<Arc<CrawlPolicy>> {
        self.get(domain).filter(|policy| !policy.is_stale(now))
    }

    /// Stores a policy, replacing any previous one, and returns it
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain key the policy applies to
    /// * `policy` - The fetched or fallback policy
    ///
    /// # Returns
    ///
    /// The stored policy, shared with the cache
    pub fn insert(&self, domain: &str, policy: CrawlPolicy) -> Arc<CrawlPolicy> {
        let policy = Arc::new(policy);
        self.entries.insert(domain.to_string(), Arc::clone(&policy));
        policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn test_new_policy_not_stale() {
        let policy = CrawlPolicy::fetched(ParsedRules::allow_all(), DAY);
        assert!(!policy.is_stale(Utc::now()));
    }

    #[test]
    fn test_policy_is_stale_after_ttl() {
        let mut policy = CrawlPolicy::fetched(ParsedRules::allow_all(), DAY);
        policy.fetched_at = Utc::now() - chrono::Duration::hours(25);
        assert!(policy.is_stale(Utc::now()));
    }

    #[test]
    fn test_policy_not_stale_at_23_hours() {
        let mut policy = CrawlPolicy::fetched(ParsedRules::allow_all(), DAY);
        policy.fetched_at = Utc::now() - chrono::Duration::hours(23);
        assert!(!policy.is_stale(Utc::now()));
    }

    #[test]
    fn test_fallback_has_own_ttl() {
        let mut policy = CrawlPolicy::fallback(ParsedRules::allow_all(), Duration::from_secs(3600));
        assert_eq!(policy.origin, PolicyOrigin::Fallback);

        policy.fetched_at = Utc::now() - chrono::Duration::minutes(61);
        assert!(policy.is_stale(Utc::now()));
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = ComplianceCache::new();
        assert!(cache.is_empty());

        cache.insert("example.org", CrawlPolicy::fetched(ParsedRules::disallow_all(), DAY));
        let policy = cache.get("example.org").unwrap();
        assert!(!policy.is_allowed("/"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("other.org").is_none());
    }

    #[test]
    fn test_get_fresh_skips_stale_entries() {
        let cache = ComplianceCache::new();
        let mut policy = CrawlPolicy::fetched(ParsedRules::allow_all(), DAY);
        policy.fetched_at = Utc::now() - chrono::Duration::days(2);
        cache.insert("example.org", policy);

        assert!(cache.get("example.org").is_some());
        assert!(cache.get_fresh("example.org", Utc::now()).is_none());
    }
}
