//! Credential cache backed by a shared key-value store.
//!
//! The token and its expiration are kept as two separate entries under a fixed namespace so any
//! store shared between client instances (or processes) can hold them. An entry missing either
//! half is treated as absent.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::token::{Clock, SystemClock, Token};

pub const TOKEN_CACHE_KEY: &str = "inspection_api_token";
pub const TOKEN_EXPIRY_CACHE_KEY: &str = "inspection_api_token_expiry";

/// Narrow interface over the key-value service holding the cached credentials.
///
/// Implementations are expected to evict entries once their `ttl` elapses. Backend failures are
/// the implementation's concern: a failing read must behave as a miss.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
    fn delete(&self, key: &str);
}

impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }
}

/// Thread-safe in-memory store. Share it between clients wrapping it in an [`Arc`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = matches!(
            entries.get(key),
            Some((_, Some(deadline))) if Instant::now() >= *deadline
        );
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.to_owned())
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        // A ttl too large to represent never expires.
        let deadline = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), (value, deadline));
    }

    fn delete(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Storage for the current bearer token.
pub trait CredentialCache {
    /// Returns the cached token unless it is absent or within the renewal buffer of expiring.
    fn get(&self) -> Option<Token>;
    fn set(&self, token: &Token);
    fn invalidate(&self);
}

#[derive(Debug)]
pub struct TokenCache<S, K = SystemClock> {
    store: S,
    clock: K,
    renewal_buffer: TimeDelta,
}

impl<S> TokenCache<S, SystemClock>
where
    S: KeyValueStore,
{
    pub fn new(store: S, renewal_buffer: TimeDelta) -> Self {
        Self::with_clock(store, SystemClock, renewal_buffer)
    }
}

impl<S, K> TokenCache<S, K>
where
    S: KeyValueStore,
    K: Clock,
{
    pub fn with_clock(store: S, clock: K, renewal_buffer: TimeDelta) -> Self {
        Self {
            store,
            clock,
            renewal_buffer,
        }
    }
}

impl<S, K> CredentialCache for TokenCache<S, K>
where
    S: KeyValueStore,
    K: Clock,
{
    fn get(&self) -> Option<Token> {
        let (Some(access_token), Some(expiry)) = (
            self.store.get(TOKEN_CACHE_KEY),
            self.store.get(TOKEN_EXPIRY_CACHE_KEY),
        ) else {
            debug!("no cached token");
            return None;
        };

        let expires_at = match DateTime::parse_from_rfc3339(&expiry) {
            Ok(expires_at) => expires_at.with_timezone(&Utc),
            Err(e) => {
                debug!("discarding cached token with unreadable expiry: {e}");
                return None;
            }
        };

        let token = Token::new(access_token, expires_at);
        if token.is_expired_at(self.clock.now(), self.renewal_buffer) {
            info!("cached token expired or about to expire");
            return None;
        }

        debug!("using cached authentication token");
        Some(token)
    }

    fn set(&self, token: &Token) {
        let Ok(ttl) = (token.expires_at() - self.clock.now()).to_std() else {
            debug!("not caching an already expired token");
            return;
        };
        // Expiry first: a reader never sees a token without its expiration.
        self.store
            .set(TOKEN_EXPIRY_CACHE_KEY, token.expires_at().to_rfc3339(), ttl);
        self.store
            .set(TOKEN_CACHE_KEY, token.access_token().to_owned(), ttl);
        debug!("token cached until {}", token.expires_at());
    }

    fn invalidate(&self) {
        self.store.delete(TOKEN_CACHE_KEY);
        self.store.delete(TOKEN_EXPIRY_CACHE_KEY);
        debug!("cached token invalidated");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::thread;

    use chrono::{TimeDelta, TimeZone, Utc};
    use mockall::mock;

    use super::*;
    use crate::token::tests::MockClock;

    mock! {
        pub CredentialCache {}
        impl CredentialCache for CredentialCache {
            fn get(&self) -> Option<Token>;
            fn set(&self, token: &Token);
            fn invalidate(&self);
        }
    }

    fn fixed_clock(now: DateTime<Utc>) -> MockClock {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(now);
        clock
    }

    #[test]
    fn in_memory_store_evicts_expired_entries() {
        let store = InMemoryStore::new();
        store.set("short", "value".into(), Duration::from_millis(10));
        store.set("long", "value".into(), Duration::from_secs(60));

        thread::sleep(Duration::from_millis(20));

        assert_eq!(store.get("short"), None);
        assert_eq!(store.get("long"), Some("value".into()));

        store.delete("long");
        assert_eq!(store.get("long"), None);
    }

    #[test]
    fn set_then_get_returns_the_token() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let cache = TokenCache::with_clock(
            InMemoryStore::new(),
            fixed_clock(now),
            TimeDelta::minutes(5),
        );
        let token = Token::new("abc".into(), now + TimeDelta::hours(1));

        cache.set(&token);

        assert_eq!(cache.get(), Some(token));
    }

    #[test]
    fn empty_cache_returns_none() {
        let cache = TokenCache::new(InMemoryStore::new(), TimeDelta::minutes(5));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn partial_entries_are_absent() {
        let store = Arc::new(InMemoryStore::new());
        store.set(TOKEN_CACHE_KEY, "abc".into(), Duration::from_secs(60));
        let cache = TokenCache::new(store.clone(), TimeDelta::zero());
        assert_eq!(cache.get(), None);

        store.delete(TOKEN_CACHE_KEY);
        store.set(
            TOKEN_EXPIRY_CACHE_KEY,
            (Utc::now() + TimeDelta::hours(1)).to_rfc3339(),
            Duration::from_secs(60),
        );
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn unreadable_expiry_is_absent() {
        let store = Arc::new(InMemoryStore::new());
        store.set(TOKEN_CACHE_KEY, "abc".into(), Duration::from_secs(60));
        store.set(
            TOKEN_EXPIRY_CACHE_KEY,
            "tomorrow".into(),
            Duration::from_secs(60),
        );
        let cache = TokenCache::new(store, TimeDelta::zero());
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn renewal_buffer_is_honored() {
        let expires_at = Utc.with_ymd_and_hms(2025, 1, 1, 13, 0, 0).unwrap();
        let buffer = TimeDelta::minutes(5);
        let token = Token::new("abc".into(), expires_at);
        let store = Arc::new(InMemoryStore::new());
        TokenCache::with_clock(
            store.clone(),
            fixed_clock(expires_at - TimeDelta::hours(1)),
            buffer,
        )
        .set(&token);

        let just_before = TokenCache::with_clock(
            store.clone(),
            fixed_clock(expires_at - buffer - TimeDelta::seconds(1)),
            buffer,
        );
        let just_after = TokenCache::with_clock(
            store,
            fixed_clock(expires_at - buffer + TimeDelta::seconds(1)),
            buffer,
        );

        assert_eq!(just_before.get(), Some(token));
        assert_eq!(just_after.get(), None);
    }

    #[test]
    fn invalidate_removes_both_entries() {
        let store = Arc::new(InMemoryStore::new());
        let cache = TokenCache::new(store.clone(), TimeDelta::minutes(5));
        cache.set(&Token::new("abc".into(), Utc::now() + TimeDelta::hours(1)));

        cache.invalidate();

        assert_eq!(store.get(TOKEN_CACHE_KEY), None);
        assert_eq!(store.get(TOKEN_EXPIRY_CACHE_KEY), None);
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn expired_tokens_are_not_stored() {
        let store = Arc::new(InMemoryStore::new());
        let cache = TokenCache::new(store.clone(), TimeDelta::zero());
        cache.set(&Token::new("abc".into(), Utc::now() - TimeDelta::seconds(1)));

        assert_eq!(store.get(TOKEN_CACHE_KEY), None);
    }

    #[test]
    fn caches_sharing_a_store_share_the_token() {
        let store = Arc::new(InMemoryStore::new());
        let writer = TokenCache::new(store.clone(), TimeDelta::minutes(5));
        let reader = TokenCache::new(store, TimeDelta::minutes(5));
        let token = Token::new("shared".into(), Utc::now() + TimeDelta::hours(1));

        writer.set(&token);

        assert_eq!(
            reader.get().map(|t| t.access_token().to_owned()),
            Some("shared".to_string())
        );
    }
}
