use std::time::Duration;
use tokio::time::Instant;

/// What a caller asking for a slot has to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot is free and spacing has elapsed
    Ready,

    /// A slot is free but the domain was hit too recently
    WaitSpacing(Duration),

    /// Every slot is taken; wait for a release
    AtCapacity,
}

/// Tracks the request bookkeeping of one domain
///
/// Invariant: `in_flight <= max_concurrency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    /// Requests currently holding a permit
    pub in_flight: u32,

    pub max_concurrency: u32,

    /// When the most recent permit was granted
    pub last_granted_at: Option<Instant>,

    /// When the most recent permit was released
    pub last_completed_at: Option<Instant>,

    /// Minimum time between two grants, and between a release and the next grant
    pub min_spacing: Duration,

    /// Permits granted since the domain was first seen
    pub granted_total: u64,
}

impl ThrottleState {
    pub fn new(max_concurrency: u32, min_spacing: Duration) -> Self {
        Self {
            in_flight: 0,
            max_concurrency: max_concurrency.max(1),
            last_granted_at: None,
            last_completed_at: None,
            min_spacing,
            granted_total: 0,
        }
    }

    /// Decides whether a permit can be granted at `now`
    pub fn admission(&self, now: Instant) -> Admission {
        if self.in_flight >= self.max_concurrency {
            return Admission::AtCapacity;
        }

        match self.time_until_next_grant(now) {
            Some(wait) => Admission::WaitSpacing(wait),
            None => Admission::Ready,
        }
    }

    /// Returns how long until spacing allows another grant, or None if it does now
    pub fn time_until_next_grant(&self, now: Instant) -> Option<Duration> {
        let last = match (self.last_granted_at, self.last_completed_at) {
            (Some(granted), Some(completed)) => granted.max(completed),
            (Some(at), None) | (None, Some(at)) => at,
            (None, None) => return None,
        };

        // Measured as elapsed time so an enormous spacing cannot overflow an Instant
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_spacing {
            Some(self.min_spacing - elapsed)
        } else {
            None
        }
    }

    /// Records a granted permit
    pub fn record_grant(&mut self, now: Instant) {
        self.in_flight += 1;
        self.granted_total += 1;
        self.last_granted_at = Some(now);
    }

    /// Records a released permit
    pub fn record_completion(&mut self, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_completed_at = Some(now);
    }

    /// Raises the spacing to at least `floor`; never lowers it
    pub fn raise_spacing(&mut self, floor: Duration) {
        self.min_spacing = self.min_spacing.max(floor);
    }
}
