use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

use crate::metrics::RATE_LIMIT_ENTRIES;

/// Decides whether a caller may trigger another alert.
///
/// Denial is a normal answer, never an error. Implementations backed by a
/// shared counter store can replace the in-memory one for multi-instance
/// deployments.
pub trait RateLimiter: Send + Sync {
    fn allow(&self, identifier: &str) -> bool;
}

// Longest window honoured; larger configured values are clamped
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// Rate limit entry - tracks alerts per IP
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Fixed-window counter kept in process memory.
///
/// Limits reset on restart and are not shared between instances.
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window: window.min(MAX_WINDOW),
            entries: DashMap::new(),
        }
    }

    pub fn allow_at(&self, identifier: &str, now: Instant) -> bool {
        let fresh = RateLimitEntry {
            count: 1,
            reset_at: now.checked_add(self.window).unwrap_or(now),
        };

        // the entry guard holds the shard lock across check and mutation
        match self.entries.entry(identifier.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if now > entry.reset_at {
                    *entry = fresh;
                    true
                } else if entry.count >= self.max_requests {
                    false
                } else {
                    entry.count += 1;
                    true
                }
            }
        }
    }

    pub fn entry(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.entries.get(identifier).map(|e| *e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops records whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now <= entry.reset_at);
        before.saturating_sub(self.entries.len())
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn allow(&self, identifier: &str) -> bool {
        self.allow_at(identifier, Instant::now())
    }
}

// Purge loop - keeps the map from growing with one-off callers
pub async fn purge_worker(limiter: Arc<InMemoryRateLimiter>, every: Duration) {
    let mut interval = interval(every);

    loop {
        interval.tick().await;

        let removed = limiter.purge_expired(Instant::now());
        RATE_LIMIT_ENTRIES.set(limiter.len() as f64);
        if removed > 0 {
            debug!(removed, remaining = limiter.len(), "purged expired rate limit records");
        }
    }
}

/// First hop of `x-forwarded-for`, or "unknown".
///
/// The header is client controlled, so this identifier is advisory only.
pub fn client_identifier(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(300);

    #[test]
    fn allows_up_to_max_then_denies_without_touching_reset() {
        let limiter = InMemoryRateLimiter::new(3, WINDOW);
        let start = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", start));
        let reset_at = limiter.entry("10.0.0.1").unwrap().reset_at;
        assert_eq!(reset_at, start + WINDOW);

        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(1)));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(2)));
        assert_eq!(limiter.entry("10.0.0.1").unwrap().count, 3);

        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(3)));
        assert!(!limiter.allow_at("10.0.0.1", start + WINDOW));
        let entry = limiter.entry("10.0.0.1").unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.reset_at, reset_at);
    }

    #[test]
    fn window_expiry_resets_count() {
        let limiter = InMemoryRateLimiter::new(3, WINDOW);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at("caller", start));
        }
        assert!(!limiter.allow_at("caller", start));

        let later = start + WINDOW + Duration::from_millis(1);
        assert!(limiter.allow_at("caller", later));
        let entry = limiter.entry("caller").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.reset_at, later + WINDOW);
    }

    #[test]
    fn oversized_window_is_clamped_instead_of_overflowing() {
        let limiter = InMemoryRateLimiter::new(3, Duration::from_secs(u64::MAX));
        let now = Instant::now();
        assert!(limiter.allow("1.2.3.4"));
        assert!(limiter.allow_at("5.6.7.8", now));
        assert_eq!(limiter.entry("5.6.7.8").unwrap().reset_at, now + MAX_WINDOW);
    }

    #[test]
    fn identifiers_are_counted_separately() {
        let limiter = InMemoryRateLimiter::new(1, WINDOW);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn purge_drops_only_expired_records() {
        let limiter = InMemoryRateLimiter::new(3, WINDOW);
        let start = Instant::now();
        limiter.allow_at("old", start);
        limiter.allow_at("new", start + Duration::from_secs(200));

        let removed = limiter.purge_expired(start + Duration::from_secs(301));
        assert_eq!(removed, 1);
        assert!(limiter.entry("old").is_none());
        assert!(limiter.entry("new").is_some());
    }

    #[test]
    fn identifier_uses_first_forwarded_hop() {
        assert_eq!(client_identifier(Some("203.0.113.7, 10.0.0.1")), "203.0.113.7");
        assert_eq!(client_identifier(Some("  ")), "unknown");
        assert_eq!(client_identifier(None), "unknown");
    }
}
