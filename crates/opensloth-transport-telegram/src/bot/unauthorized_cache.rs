//! Unauthorized access flood protection
//!
//! A sender outside the allow-list gets one "Access denied" reply per
//! cooldown window. Everything else they send inside the window is dropped
//! without a reply.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks which denied users were recently told so
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// user_id -> () while the cooldown runs; the entry expiring ends it
    notified: Cache<i64, ()>,
    cooldown: Duration,
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Create a cache.
    ///
    /// * `cooldown_secs` - Seconds between denial replies to the same user
    /// * `ttl_secs` - Upper bound on how long an entry may live
    /// * `max_capacity` - Maximum number of tracked users
    ///
    /// ```
    /// use opensloth_transport_telegram::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 7200, 10_000);
    /// assert_eq!(cache.cooldown().as_secs(), 1200);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let cooldown = Duration::from_secs(cooldown_secs);
        // An entry must not outlive the cooldown, or the user stays silenced
        let ttl = Duration::from_secs(ttl_secs).min(cooldown);
        let notified = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self {
            notified,
            cooldown,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Claim the right to send a denial reply to `user_id`.
    ///
    /// Returns `true` for the first attempt in a cooldown window and
    /// starts the window. Concurrent attempts for the same user see exactly
    /// one `true`.
    pub async fn try_claim(&self, user_id: i64, user_name: &str) -> bool {
        let entry = self.notified.entry(user_id).or_insert(()).await;
        if entry.is_fresh() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        // Throttle: one log line per 100 silenced attempts
        if count.is_multiple_of(100) {
            debug!(
                user_id,
                user_name, silenced = count, "Silenced unauthorized attempts"
            );
        }
        false
    }

    /// Give a claimed window back, e.g. when the denial reply failed to send
    pub async fn release(&self, user_id: i64) {
        self.notified.invalidate(&user_id).await;
    }

    /// Users currently inside a cooldown window
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.notified.entry_count()
    }

    /// Denied attempts dropped without a reply so far
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Configured cooldown
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_reply_per_window() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        assert!(cache.try_claim(12345, "mallory").await);
        assert!(!cache.try_claim(12345, "mallory").await);
        assert!(!cache.try_claim(12345, "mallory").await);
        assert_eq!(cache.silenced_count(), 2);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        assert!(cache.try_claim(111, "a").await);
        assert!(cache.try_claim(222, "b").await);

        cache.notified.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_release_reopens_window() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        assert!(cache.try_claim(7, "eve").await);
        cache.release(7).await;
        assert!(cache.try_claim(7, "eve").await);
    }

    #[tokio::test]
    async fn test_window_expires() {
        let cache = UnauthorizedCache::new(1, 7200, 100);
        assert_eq!(cache.cooldown(), Duration::from_secs(1));

        assert!(cache.try_claim(9, "trudy").await);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.try_claim(9, "trudy").await);
    }

    #[tokio::test]
    async fn test_concurrent_claims_yield_one_reply() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        let claims: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.try_claim(5, "bot").await })
            })
            .collect();

        let mut granted = 0;
        for claim in claims {
            if claim.await.unwrap_or(false) {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }
}
