//! Per-domain concurrency and spacing limits
//!
//! Every domain gets its own slot, created on first use and kept for the
//! life of the [`DomainThrottle`]. Callers for different domains never
//! contend on anything but the map shard lookup.

mod state;

pub use state::{Admission, ThrottleState};

use crate::config::{Config, SiteOverride};
use crate::url::find_site_override;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default limits applied to a domain with no site override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub max_concurrency: u32,
    pub min_spacing: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            min_spacing: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
struct DomainSlot {
    state: Mutex<ThrottleState>,

    /// Serializes acquirers so the spacing check and the grant are atomic
    gate: tokio::sync::Mutex<()>,

    /// Signalled whenever a permit is released
    released: Notify,
}

impl DomainSlot {
    fn new(settings: ThrottleSettings) -> Self {
        Self {
            state: Mutex::new(ThrottleState::new(
                settings.max_concurrency,
                settings.min_spacing,
            )),
            gate: tokio::sync::Mutex::new(()),
            released: Notify::new(),
        }
    }
}

/// Scoped admission to a domain
///
/// Dropping the permit releases the slot and stamps the completion time, on
/// every exit path including cancellation of the owning future.
#[derive(Debug)]
pub struct ThrottlePermit {
    domain: String,
    granted_at: Instant,
    slot: Arc<DomainSlot>,
}

impl ThrottlePermit {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// When this permit was granted
    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }

    /// Releases the permit now instead of at end of scope
    pub fn release(self) {}
}

impl Drop for ThrottlePermit {
    fn drop(&mut self) {
        let now = Instant::now();
        self.slot.state.lock().record_completion(now);
        self.slot.released.notify_one();
        tracing::trace!("Released throttle permit for {}", self.domain);
    }
}

/// Bounds in-flight requests and spaces grants per domain
#[derive(Debug)]
pub struct DomainThrottle {
    slots: DashMap<String, Arc<DomainSlot>>,
    defaults: ThrottleSettings,
    sites: Vec<SiteOverride>,
}

impl DomainThrottle {
    pub fn new(defaults: ThrottleSettings, sites: Vec<SiteOverride>) -> Self {
        Self {
            slots: DashMap::new(),
            defaults,
            sites,
        }
    }

    /// Builds a throttle from the pipeline defaults and site overrides
    pub fn from_config(config: &Config) -> Self {
        let defaults = ThrottleSettings {
            max_concurrency: config.pipeline.default_concurrency,
            min_spacing: config.pipeline.default_delay(),
        };
        Self::new(defaults, config.sites.clone())
    }

    /// Limits that apply to `domain` (a domain key, possibly with a port)
    pub fn settings_for(&self, domain: &str) -> ThrottleSettings {
        let host = strip_port(domain);
        match find_site_override(&self.sites, host) {
            Some(site) => ThrottleSettings {
                max_concurrency: site.concurrency.unwrap_or(self.defaults.max_concurrency),
                min_spacing: site.delay().unwrap_or(self.defaults.min_spacing),
            },
            None => self.defaults,
        }
    }

    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        if let Some(slot) = self.slots.get(domain) {
            return Arc::clone(slot.value());
        }

        let settings = self.settings_for(domain);
        let slot = self
            .slots
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainSlot::new(settings)));
        Arc::clone(slot.value())
    }

    /// Waits until `domain` has a free slot and its spacing has elapsed
    ///
    /// The caller is suspended, never spinning. Acquirers for one domain are
    /// served one at a time, so no two grants are closer than the spacing.
    pub async fn acquire(&self, domain: &str) -> ThrottlePermit {
        let slot = self.slot(domain);
        let _gate = slot.gate.lock().await;

        loop {
            // A release between the check and the await leaves a stored wakeup
            let released = slot.released.notified();

            let now = Instant::now();
            let admission = slot.state.lock().admission(now);

            match admission {
                Admission::Ready => break,
                Admission::WaitSpacing(wait) => {
                    tracing::debug!("Spacing {} for {:?}", domain, wait);
                    tokio::time::sleep(wait).await;
                }
                Admission::AtCapacity => {
                    tracing::debug!("{} at capacity, waiting for a release", domain);
                    released.await;
                }
            }
        }

        let granted_at = Instant::now();
        slot.state.lock().record_grant(granted_at);

        ThrottlePermit {
            domain: domain.to_string(),
            granted_at,
            slot: Arc::clone(&slot),
        }
    }

    /// Releases a permit; equivalent to dropping it
    pub fn release(&self, permit: ThrottlePermit) {
        drop(permit);
    }

    /// Raises a domain's spacing to honour a robots.txt Crawl-delay
    pub fn observe_crawl_delay(&self, domain: &str, delay: Duration) {
        let slot = self.slot(domain);
        let mut state = slot.state.lock();
        if delay > state.min_spacing {
            tracing::debug!("Raising spacing for {} to {:?} (Crawl-delay)", domain, delay);
            state.raise_spacing(delay);
        }
    }

    /// Returns a copy of a domain's bookkeeping, if the domain has been seen
    pub fn snapshot(&self, domain: &str) -> Option<ThrottleState> {
        self.slots.get(domain).map(|slot| *slot.state.lock())
    }

    /// Number of domains with throttle state
    pub fn domain_count(&self) -> usize {
        self.slots.len()
    }
}

/// Drops a trailing `:port` from a domain key
fn strip_port(domain: &str) -> &str {
    match domain.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => domain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(concurrency: u32, spacing_ms: u64) -> DomainThrottle {
        DomainThrottle::new(
            ThrottleSettings {
                max_concurrency: concurrency,
                min_spacing: Duration::from_millis(spacing_ms),
            },
            Vec::new(),
        )
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.org:8080"), "example.org");
        assert_eq!(strip_port("example.org"), "example.org");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
        assert_eq!(strip_port("[::1]"), "[::1]");
    }

    #[test]
    fn test_settings_use_overrides() {
        let throttle = DomainThrottle::new(
            ThrottleSettings::default(),
            vec![
                SiteOverride::new("*.sec.gov").with_delay(Duration::from_secs(5)),
                SiteOverride::new("slow.example.org").with_concurrency(1),
            ],
        );

        let sec = throttle.settings_for("www.sec.gov");
        assert_eq!(sec.min_spacing, Duration::from_secs(5));
        assert_eq!(sec.max_concurrency, 2);

        let slow = throttle.settings_for("slow.example.org:8443");
        assert_eq!(slow.max_concurrency, 1);
        assert_eq!(slow.min_spacing, Duration::from_secs(2));

        assert_eq!(throttle.settings_for("other.org"), ThrottleSettings::default());
    }

    #[tokio::test]
    async fn test_permit_updates_in_flight() {
        let throttle = throttle(2, 0);
        assert!(throttle.snapshot("example.org").is_none());

        let permit = throttle.acquire("example.org").await;
        assert_eq!(permit.domain(), "example.org");
        assert_eq!(throttle.snapshot("example.org").unwrap().in_flight, 1);

        throttle.release(permit);
        let state = throttle.snapshot("example.org").unwrap();
        assert_eq!(state.in_flight, 0);
        assert!(state.last_completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grants_are_spaced() {
        let throttle = Arc::new(throttle(4, 2000));

        let first = throttle.acquire("example.org").await;
        let second = throttle.acquire("example.org").await;

        assert!(second.granted_at() - first.granted_at() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_after_release() {
        let throttle = throttle(1, 1000);

        let permit = throttle.acquire("example.org").await;
        tokio::time::sleep(Duration::from_millis(3000)).await;
        let released_at = Instant::now();
        drop(permit);

        let next = throttle.acquire("example.org").await;
        assert!(next.granted_at() - released_at >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_holds() {
        let throttle = Arc::new(throttle(2, 0));
        let mut handles = Vec::new();

        for _ in 0..6 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                let _permit = throttle.acquire("example.org").await;
                let in_flight = throttle.snapshot("example.org").unwrap().in_flight;
                tokio::time::sleep(Duration::from_millis(100)).await;
                in_flight
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap() <= 2);
        }
        assert_eq!(throttle.snapshot("example.org").unwrap().in_flight, 0);
        assert_eq!(throttle.snapshot("example.org").unwrap().granted_total, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_do_not_block_each_other() {
        let throttle = throttle(1, 10_000);

        let _a = throttle.acquire("a.example").await;
        let started = Instant::now();
        let _b = throttle.acquire("b.example").await;

        assert_eq!(Instant::now(), started);
        assert_eq!(throttle.domain_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_holder_releases() {
        let throttle = Arc::new(throttle(1, 0));

        let holder = {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move {
                let _permit = throttle.acquire("example.org").await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(throttle.snapshot("example.org").unwrap().in_flight, 1);

        holder.abort();
        let _ = holder.await;

        assert_eq!(throttle.snapshot("example.org").unwrap().in_flight, 0);
        let _permit = throttle.acquire("example.org").await;
    }

    #[tokio::test]
    async fn test_observe_crawl_delay_raises_spacing() {
        let throttle = throttle(1, 500);
        throttle.observe_crawl_delay("example.org", Duration::from_secs(3));
        assert_eq!(
            throttle.snapshot("example.org").unwrap().min_spacing,
            Duration::from_secs(3)
        );

        throttle.observe_crawl_delay("example.org", Duration::from_secs(1));
        assert_eq!(
            throttle.snapshot("example.org").unwrap().min_spacing,
            Duration::from_secs(3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_enormous_crawl_delay_waits_instead_of_panicking() {
        let throttle = throttle(1, 0);
        drop(throttle.acquire("example.org").await);
        throttle.observe_crawl_delay("example.org", Duration::MAX);

        let state = throttle.snapshot("example.org").unwrap();
        assert!(matches!(
            state.admission(Instant::now()),
            Admission::WaitSpacing(wait) if wait > Duration::from_secs(3600)
        ));

        let blocked = tokio::time::timeout(
            Duration::from_secs(60),
            throttle.acquire("example.org"),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(throttle.snapshot("example.org").unwrap().in_flight, 0);
    }
}
