//! Single-slot access-token cache.
//!
//! One tenant, one token. The owner decides when to consult and when to
//! refill; the cache itself only answers "is this still trusted at `now`".

use std::time::{Duration, Instant};

/// One cached bearer token and the moment it stops being trusted.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Option<CachedToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// The cached token, if it is still valid at `now`.
    pub fn current(&self, now: Instant) -> Option<&str> {
        self.slot
            .as_ref()
            .filter(|token| now < token.expires_at)
            .map(|token| token.access_token.as_str())
    }

    /// Store a fresh token, trusting it for `expires_in` minus the refresh
    /// margin so the slot turns stale before the token actually dies.
    pub fn store(
        &mut self,
        access_token: String,
        expires_in: Duration,
        margin: Duration,
        now: Instant,
    ) {
        let lifetime = expires_in.saturating_sub(margin);
        self.slot = Some(CachedToken {
            access_token,
            expires_at: now + lifetime,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARGIN: Duration = Duration::from_secs(60);

    #[test]
    fn test_empty_cache_has_no_token() {
        let cache = TokenCache::new();
        assert_eq!(cache.current(Instant::now()), None);
    }

    #[test]
    fn test_fresh_token_is_served() {
        let now = Instant::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), Duration::from_secs(3600), MARGIN, now);
        assert_eq!(cache.current(now), Some("tok-1"));
        assert_eq!(cache.current(now + Duration::from_secs(3000)), Some("tok-1"));
    }

    #[test]
    fn test_token_expires_with_the_refresh_margin() {
        let now = Instant::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), Duration::from_secs(120), MARGIN, now);
        // Trusted lifetime is 120 - 60 = 60 seconds.
        assert_eq!(cache.current(now + Duration::from_secs(59)), Some("tok-1"));
        assert_eq!(cache.current(now + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_margin_longer_than_lifetime_means_never_cached() {
        let now = Instant::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), Duration::from_secs(30), MARGIN, now);
        assert_eq!(cache.current(now), None);
    }

    #[test]
    fn test_store_replaces_the_previous_slot() {
        let now = Instant::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), Duration::from_secs(3600), MARGIN, now);
        cache.store("tok-2".to_string(), Duration::from_secs(3600), MARGIN, now);
        assert_eq!(cache.current(now), Some("tok-2"));
    }
}
