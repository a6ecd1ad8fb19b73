use crate::config::{RobotsConfig, UnreachablePolicy};
use crate::robots::{parse_rules, ComplianceCache, CrawlPolicy, ParsedRules};
use crate::url::{domain_key, is_feed_url, robots_url};
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Why a robots.txt could not be used
#[derive(Debug)]
enum RobotsUnavailable {
    Network(String),
    Status(u16),
    Malformed(&'static str),
}

impl std::fmt::Display for RobotsUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "request failed: {}", e),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Malformed(why) => write!(f, "unusable body: {}", why),
        }
    }
}

/// The outcome of evaluating a URL against its domain's robots.txt
#[derive(Debug, Clone)]
pub struct RobotsDecision {
    pub allowed: bool,

    /// Policy consulted, or `None` when robots.txt was bypassed (feeds)
    pub policy: Option<Arc<CrawlPolicy>>,
}

impl RobotsDecision {
    fn bypassed() -> Self {
        Self {
            allowed: true,
            policy: None,
        }
    }
}

/// Answers "may this URL be fetched?" using cached per-domain policies
///
/// Robots.txt is fetched at most once per domain per TTL. Fetch failures
/// never escape: they become the configured default policy.
#[derive(Debug, Clone)]
pub struct RobotsEvaluator {
    client: Client,
    cache: Arc<ComplianceCache>,
    user_agent: String,
    config: RobotsConfig,
}

impl RobotsEvaluator {
    pub fn new(client: Client, user_agent: impl Into<String>, config: RobotsConfig) -> Self {
        Self {
            client,
            cache: Arc::new(ComplianceCache::new()),
            user_agent: user_agent.into(),
            config,
        }
    }

    /// Shares an existing cache instead of starting with an empty one
    pub fn with_cache(mut self, cache: Arc<ComplianceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ComplianceCache> {
        &self.cache
    }

    /// Returns true if robots.txt allows fetching `url`
    pub async fn may_fetch(&self, url: &Url) -> bool {
        self.evaluate(url).await.allowed
    }

    /// Evaluates `url` and returns the decision with the policy behind it
    pub async fn evaluate(&self, url: &Url) -> RobotsDecision {
        if is_feed_url(url) {
            tracing::debug!("Feed URL {} bypasses robots.txt", url);
            return RobotsDecision::bypassed();
        }

        let domain = match domain_key(url) {
            Some(domain) => domain,
            None => {
                tracing::warn!("No host in {}, refusing", url);
                return RobotsDecision {
                    allowed: false,
                    policy: None,
                };
            }
        };

        let policy = self.policy_for(&domain, url).await;
        let path = robotstxt::get_path_params_query(url.as_str());
        let allowed = policy.is_allowed(&path);

        if !allowed {
            tracing::info!("robots.txt disallows {} for {}", path, domain);
        }

        RobotsDecision {
            allowed,
            policy: Some(policy),
        }
    }

    /// Returns a fresh policy for `domain`, fetching robots.txt if needed
    async fn policy_for(&self, domain: &str, url: &Url) -> Arc<CrawlPolicy> {
        if let Some(policy) = self.cache.get_fresh(domain, Utc::now()) {
            return policy;
        }

        // No cache entry is held while the request is in flight
        let policy = match self.fetch_rules(url).await {
            Ok(rules) => {
                tracing::debug!(
                    "Loaded robots.txt for {} ({} allow, {} disallow, crawl-delay {:?})",
                    domain,
                    rules.allow_rules.len(),
                    rules.disallow_rules.len(),
                    rules.crawl_delay
                );
                CrawlPolicy::fetched(rules, self.config.ttl())
            }
            Err(reason) => {
                tracing::warn!(
                    "robots.txt for {} unavailable ({}), applying {:?} default",
                    domain,
                    reason,
                    self.config.on_unreachable
                );
                CrawlPolicy::fallback(self.default_rules(), self.config.fallback_ttl())
            }
        };

        self.cache.insert(domain, policy)
    }

    fn default_rules(&self) -> ParsedRules {
        match self.config.on_unreachable {
            UnreachablePolicy::Permissive => ParsedRules::allow_all(),
            UnreachablePolicy::Restrictive => ParsedRules::disallow_all(),
        }
    }

    async fn fetch_rules(&self, url: &Url) -> Result<ParsedRules, RobotsUnavailable> {
        let robots = robots_url(url).ok_or(RobotsUnavailable::Malformed("no host"))?;

        let response = self
            .client
            .get(robots)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| RobotsUnavailable::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RobotsUnavailable::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RobotsUnavailable::Network(e.to_string()))?;

        let body = std::str::from_utf8(&bytes)
            .map_err(|_| RobotsUnavailable::Malformed("not valid UTF-8"))?;

        if looks_like_html(body) {
            return Err(RobotsUnavailable::Malformed("HTML served in place of robots.txt"));
        }

        Ok(parse_rules(body, &self.user_agent))
    }
}

/// Detects soft-404 pages served with a 200 status
fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}
