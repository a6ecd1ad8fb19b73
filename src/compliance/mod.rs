//! Admission control in front of every fetch
//!
//! The gate asks the robots evaluator first, then takes the domain's
//! throttle slot, and last a slot of the process-wide request limit. A
//! request refused on policy grounds never occupies either slot.

use crate::robots::RobotsEvaluator;
use crate::throttle::{DomainThrottle, ThrottlePermit};
use crate::url::domain_key;
use crate::{DownloadError, Result, TidepoolError, UrlError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Requests allowed in flight across all domains unless configured otherwise
pub const DEFAULT_GLOBAL_CONCURRENCY: usize = 12;

/// Admission to fetch one URL
///
/// Holds a slot of the process-wide limit and the domain's throttle permit.
/// Both are returned when the permit is dropped.
#[derive(Debug)]
pub struct GatePermit {
    _global: OwnedSemaphorePermit,
    throttle: ThrottlePermit,
}

impl GatePermit {
    pub fn domain(&self) -> &str {
        self.throttle.domain()
    }

    pub fn throttle(&self) -> &ThrottlePermit {
        &self.throttle
    }
}

/// Robots evaluation, per-domain throttling, and a global request limit
#[derive(Debug)]
pub struct ComplianceGate {
    robots: RobotsEvaluator,
    throttle: Arc<DomainThrottle>,
    global: Arc<Semaphore>,
    global_limit: usize,
    respect_crawl_delay: bool,
}

impl ComplianceGate {
    pub fn new(robots: RobotsEvaluator, throttle: Arc<DomainThrottle>) -> Self {
        Self {
            robots,
            throttle,
            global: Arc::new(Semaphore::new(DEFAULT_GLOBAL_CONCURRENCY)),
            global_limit: DEFAULT_GLOBAL_CONCURRENCY,
            respect_crawl_delay: true,
        }
    }

    /// Sets whether a robots.txt Crawl-delay may raise a domain's spacing
    pub fn respect_crawl_delay(mut self, respect: bool) -> Self {
        self.respect_crawl_delay = respect;
        self
    }

    /// Bounds the requests in flight across all domains (at least one)
    pub fn with_global_limit(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        self.global = Arc::new(Semaphore::new(limit));
        self.global_limit = limit;
        self
    }

    pub fn robots(&self) -> &RobotsEvaluator {
        &self.robots
    }

    pub fn throttle(&self) -> &Arc<DomainThrottle> {
        &self.throttle
    }

    pub fn global_limit(&self) -> usize {
        self.global_limit
    }

    /// Slots of the global limit not currently held
    pub fn global_available(&self) -> usize {
        self.global.available_permits()
    }

    /// Admits `url` or refuses it
    ///
    /// Returns `PolicyDenied` without touching either limit when robots.txt
    /// forbids the URL. Otherwise waits for the domain's throttle permit and
    /// then for a global slot.
    pub async fn check_and_acquire(&self, url: &Url) -> Result<GatePermit> {
        let domain = domain_key(url).ok_or(TidepoolError::Url(UrlError::MissingDomain))?;

        let decision = self.robots.evaluate(url).await;
        if !decision.allowed {
            return Err(TidepoolError::PolicyDenied {
                url: url.to_string(),
            });
        }

        if self.respect_crawl_delay {
            if let Some(delay) = decision.policy.as_ref().and_then(|p| p.crawl_delay()) {
                self.throttle.observe_crawl_delay(&domain, delay);
            }
        }

        let throttle = self.throttle.acquire(&domain).await;

        // The semaphore is never closed while the gate is alive
        let global = Arc::clone(&self.global)
            .acquire_owned()
            .await
            .map_err(|e| DownloadError::Network {
                url: url.to_string(),
                reason: e.to_string(),
                transient: false,
            })?;

        tracing::debug!(
            "Admitted {} ({} global slots left)",
            url,
            self.global.available_permits()
        );
        Ok(GatePermit {
            _global: global,
            throttle,
        })
    }
}
