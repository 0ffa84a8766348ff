//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use euprava_storage::MemoryStorage;
use euprava_workflow::{Actor, Catalog, Identity, Users, Workflow};
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Storage backend the server runs on.
pub(crate) type Backend = MemoryStorage;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP fixed-window rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// `Err(retry_after_secs)` once the IP has used up its window.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    /// Counts a request from `ip` at `now`. Entries whose window has
    /// lapsed are swept first so idle IPs do not accumulate.
    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        tracker.retain(|_, (_, start)| {
            now.saturating_duration_since(*start).as_secs() < RATE_LIMIT_WINDOW_SECS
        });

        let entry = tracker.entry(ip).or_insert((0, now));
        let elapsed = now.saturating_duration_since(entry.1).as_secs();

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.tracker.lock().await.len()
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) workflow: Workflow<Backend>,
    pub(crate) identity: Identity<Backend>,
    pub(crate) catalog: Catalog<Backend>,
    pub(crate) users: Users<Backend>,
    pub(crate) rate_limiter: RateLimiter,
}

impl AppState {
    pub(crate) fn new(storage: Arc<Backend>, rate_limit: u64) -> Self {
        Self {
            workflow: Workflow::new(Arc::clone(&storage)),
            identity: Identity::new(Arc::clone(&storage)),
            catalog: Catalog::new(Arc::clone(&storage)),
            users: Users::new(storage),
            rate_limiter: RateLimiter::new(rate_limit),
        }
    }
}

/// The authenticated caller, inserted into request extensions by
/// [`super::middleware::auth_middleware`].
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub(crate) actor: Actor,
    pub(crate) token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    #[tokio::test]
    async fn rate_limiter_blocks_after_budget() {
        let limiter = RateLimiter::new(2);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(limiter.check(ip).await.is_ok());
        assert!(limiter.check(ip).await.is_ok());
        let retry = limiter.check(ip).await.unwrap_err();
        assert!(retry <= RATE_LIMIT_WINDOW_SECS);

        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert!(limiter.check(other).await.is_ok());
    }

    #[tokio::test]
    async fn idle_ips_are_swept_once_their_window_lapses() {
        let limiter = RateLimiter::new(1);
        let start = Instant::now();
        let idle = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let busy = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check_at(idle, start).await.is_ok());
        assert!(limiter.check_at(busy, start).await.is_ok());
        assert!(limiter.check_at(busy, start).await.is_err());
        assert_eq!(limiter.tracked().await, 2);

        let later = start + Duration::from_secs(RATE_LIMIT_WINDOW_SECS);
        assert!(limiter.check_at(busy, later).await.is_ok());
        assert_eq!(limiter.tracked().await, 1, "idle IP should be gone");
    }
}
