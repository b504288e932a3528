//! Public-key cache with refresh-ahead
//!
//! Holds a single verification key for a fixed TTL. Reads share a lock; a
//! miss takes the exclusive lock and re-checks before fetching, so
//! concurrent misses collapse into one fetch. When a hit falls inside the
//! refresh-ahead window a background task fetches a replacement without
//! blocking the caller. Background tasks are tracked and joined by
//! [`PublicKeyCache::shutdown`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tiergate_domain::constants::{PUBLIC_KEY_CACHE_TTL_SECS, PUBLIC_KEY_REFRESH_AHEAD_SECS};
use tiergate_domain::KeyCacheSettings;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::error::{AuthError, AuthResult};
use super::keys::{parse_public_key_pem, VerificationKey};

/// Source of PEM-encoded verification keys
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Fetch the current public key as PEM text.
    ///
    /// # Errors
    /// Returns `AuthError::KeyFetch` (or `Transport`) when no key is
    /// available.
    async fn fetch_public_key(&self) -> AuthResult<String>;
}

/// Callback run after every invalidation
pub type InvalidateHook = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Cache timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCacheConfig {
    /// How long a fetched key is trusted
    pub ttl: Duration,
    /// Start a background refresh when this close to expiry
    pub refresh_ahead: Duration,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(PUBLIC_KEY_CACHE_TTL_SECS),
            refresh_ahead: Duration::from_secs(PUBLIC_KEY_REFRESH_AHEAD_SECS),
        }
    }
}

impl From<&KeyCacheSettings> for KeyCacheConfig {
    fn from(settings: &KeyCacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds),
            refresh_ahead: Duration::from_secs(settings.refresh_ahead_seconds),
        }
    }
}

/// Point-in-time view of the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCacheInfo {
    pub has_key: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ttl: Duration,
    pub is_valid: bool,
}

#[derive(Debug, Clone)]
struct CachedKey {
    key: VerificationKey,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CachedKey {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

struct CacheInner {
    entry: RwLock<Option<CachedKey>>,
    fetcher: Arc<dyn KeyFetcher>,
    hook: parking_lot::Mutex<Option<InvalidateHook>>,
    config: KeyCacheConfig,
    refresh_in_flight: AtomicBool,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

/// Shared public-key cache
///
/// Cloning is cheap; clones share one entry and one background task group.
#[derive(Clone)]
pub struct PublicKeyCache {
    inner: Arc<CacheInner>,
}

impl PublicKeyCache {
    /// Create an empty cache with the default 5 minute TTL.
    #[must_use]
    pub fn new(fetcher: Arc<dyn KeyFetcher>) -> Self {
        Self::with_config(fetcher, KeyCacheConfig::default())
    }

    /// Create an empty cache with explicit timing.
    #[must_use]
    pub fn with_config(fetcher: Arc<dyn KeyFetcher>, config: KeyCacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entry: RwLock::new(None),
                fetcher,
                hook: parking_lot::Mutex::new(None),
                config,
                refresh_in_flight: AtomicBool::new(false),
                tasks: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Register a hook run after every invalidation.
    pub fn set_invalidate_hook<F>(&self, hook: F)
    where
        F: Fn() -> Result<(), String> + Send + Sync + 'static,
    {
        *self.inner.hook.lock() = Some(Arc::new(hook));
    }

    /// Return the cached key, fetching it on a miss.
    ///
    /// # Errors
    /// Propagates the fetch or parse error; the cache is left empty.
    pub async fn get_public_key(&self) -> AuthResult<VerificationKey> {
        {
            let guard = self.inner.entry.read().await;
            if let Some(entry) = guard.as_ref() {
                let now = Utc::now();
                if entry.is_valid_at(now) {
                    if self.within_refresh_window(entry, now) {
                        self.spawn_background_refresh();
                    }
                    return Ok(entry.key.clone());
                }
            }
        }

        self.refresh_key().await
    }

    /// Clear the entry and run the invalidation hook.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidationHook` if the hook fails. The entry is
    /// cleared regardless.
    pub async fn invalidate(&self) -> AuthResult<()> {
        *self.inner.entry.write().await = None;
        debug!("Public key cache invalidated");

        let hook = self.inner.hook.lock().clone();
        if let Some(hook) = hook {
            hook().map_err(AuthError::InvalidationHook)?;
        }
        Ok(())
    }

    /// Snapshot of the cache state.
    pub async fn cache_info(&self) -> KeyCacheInfo {
        let guard = self.inner.entry.read().await;
        let ttl = self.inner.config.ttl;
        match guard.as_ref() {
            Some(entry) => KeyCacheInfo {
                has_key: true,
                cached_at: Some(entry.cached_at),
                expires_at: Some(entry.expires_at),
                ttl,
                is_valid: entry.is_valid_at(Utc::now()),
            },
            None => KeyCacheInfo {
                has_key: false,
                cached_at: None,
                expires_at: None,
                ttl,
                is_valid: false,
            },
        }
    }

    /// Cancel and join outstanding background refreshes.
    ///
    /// Further refresh-ahead triggers are ignored; foreground fetches still
    /// work.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("Public key cache background tasks stopped");
    }

    /// Whether a background refresh is currently running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh_in_flight.load(Ordering::Acquire)
    }

    fn within_refresh_window(&self, entry: &CachedKey, now: DateTime<Utc>) -> bool {
        let remaining = (entry.expires_at - now).to_std().unwrap_or(Duration::ZERO);
        remaining <= self.inner.config.refresh_ahead
    }

    async fn refresh_key(&self) -> AuthResult<VerificationKey> {
        let mut guard = self.inner.entry.write().await;

        if let Some(entry) = guard.as_ref() {
            if entry.is_valid_at(Utc::now()) {
                return Ok(entry.key.clone());
            }
        }

        debug!("Fetching public key");
        let fetched = match self.inner.fetcher.fetch_public_key().await {
            Ok(pem) => parse_public_key_pem(&pem),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(key) => {
                *guard = Some(self.entry_for(key.clone()));
                info!(encoding = %key.encoding(), "Public key cached");
                Ok(key)
            }
            Err(e) => {
                *guard = None;
                warn!(error = %e, "Public key fetch failed");
                Err(e)
            }
        }
    }

    fn spawn_background_refresh(&self) {
        if self.inner.cancel.is_cancelled()
            || self.inner.refresh_in_flight.swap(true, Ordering::AcqRel)
        {
            return;
        }

        let cache = self.clone();
        self.inner.tasks.spawn(async move {
            let inner = &cache.inner;
            tokio::select! {
                _ = inner.cancel.cancelled() => {
                    debug!("Background key refresh cancelled");
                }
                result = inner.fetcher.fetch_public_key() => {
                    match result.and_then(|pem| parse_public_key_pem(&pem)) {
                        Ok(key) => {
                            *inner.entry.write().await = Some(cache.entry_for(key));
                            debug!("Public key refreshed ahead of expiry");
                        }
                        Err(e) => {
                            warn!(error = %e, "Background public key refresh failed");
                        }
                    }
                }
            }
            inner.refresh_in_flight.store(false, Ordering::Release);
        });
    }

    fn entry_for(&self, key: VerificationKey) -> CachedKey {
        let cached_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.inner.config.ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        CachedKey { key, cached_at, expires_at: cached_at + ttl }
    }
}

impl fmt::Debug for PublicKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyCache")
            .field("config", &self.inner.config)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::key_cache.
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::testing::fixtures;
    use crate::testing::MockKeyFetcher;

    fn cache_with(fetcher: &Arc<MockKeyFetcher>, ttl: Duration, ahead: Duration) -> PublicKeyCache {
        PublicKeyCache::with_config(
            Arc::clone(fetcher) as Arc<dyn KeyFetcher>,
            KeyCacheConfig { ttl, refresh_ahead: ahead },
        )
    }

    /// Validates `PublicKeyCache::get_public_key` behavior for the cached hit
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms two reads cause one fetch.
    /// - Confirms `cache_info` reports a valid entry with the configured TTL.
    #[tokio::test]
    async fn test_hit_does_not_refetch() {
        let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
        let cache = cache_with(&fetcher, Duration::from_secs(300), Duration::from_secs(60));

        cache.get_public_key().await.unwrap();
        cache.get_public_key().await.unwrap();
        assert_eq!(fetcher.fetch_count(), 1);

        let info = cache.cache_info().await;
        assert!(info.has_key);
        assert!(info.is_valid);
        assert_eq!(info.ttl, Duration::from_secs(300));
        assert!(info.expires_at > info.cached_at);
    }

    /// Validates `PublicKeyCache::get_public_key` behavior for the concurrent
    /// miss scenario.
    ///
    /// Assertions:
    /// - Confirms 16 concurrent misses trigger exactly one fetch.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_single_fetch() {
        let fetcher = Arc::new(
            MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM).with_delay(Duration::from_millis(50)),
        );
        let cache = cache_with(&fetcher, Duration::from_secs(300), Duration::from_secs(60));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_public_key().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(fetcher.fetch_count(), 1);
    }

    /// Validates `PublicKeyCache::get_public_key` behavior for the fetch
    /// failure scenario.
    ///
    /// Assertions:
    /// - Ensures the error propagates and the cache stays empty.
    /// - Ensures a later call retries the fetch.
    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_empty() {
        let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
        fetcher.set_should_fail(true);
        let cache = PublicKeyCache::new(Arc::clone(&fetcher) as Arc<dyn KeyFetcher>);

        assert!(matches!(cache.get_public_key().await, Err(AuthError::KeyFetch(_))));
        assert!(!cache.cache_info().await.has_key);

        fetcher.set_should_fail(false);
        cache.get_public_key().await.unwrap();
        assert_eq!(fetcher.fetch_count(), 2);
    }

    /// Validates `PublicKeyCache::get_public_key` behavior for the bad key
    /// material scenario.
    ///
    /// Assertions:
    /// - Ensures a non-RSA key is reported as `KeyFormat` and not cached.
    #[tokio::test]
    async fn test_unparsable_key_not_cached() {
        let fetcher = Arc::new(MockKeyFetcher::new(fixtures::EC_PUBLIC_KEY_PEM));
        let cache = PublicKeyCache::new(Arc::clone(&fetcher) as Arc<dyn KeyFetcher>);

        assert!(matches!(cache.get_public_key().await, Err(AuthError::KeyFormat(_))));
        assert!(!cache.cache_info().await.has_key);
    }

    /// Validates `PublicKeyCache::get_public_key` behavior for the expired
    /// entry scenario.
    ///
    /// Assertions:
    /// - Confirms a read after the TTL fetches again.
    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
        let cache = cache_with(&fetcher, Duration::from_millis(50), Duration::ZERO);

        cache.get_public_key().await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!cache.cache_info().await.is_valid);

        cache.get_public_key().await.unwrap();
        assert_eq!(fetcher.fetch_count(), 2);
    }

    /// Validates `PublicKeyCache::get_public_key` behavior for the
    /// refresh-ahead scenario.
    ///
    /// Assertions:
    /// - Confirms a hit inside the window returns the old key immediately.
    /// - Confirms the background task installs the rotated key.
    /// - Confirms `shutdown` joins cleanly.
    #[tokio::test]
    async fn test_refresh_ahead_installs_new_key() {
        let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
        // Every hit is inside the window when it equals the TTL
        let cache = cache_with(&fetcher, Duration::from_secs(60), Duration::from_secs(60));

        let first = cache.get_public_key().await.unwrap();
        assert_eq!(first.pem(), fixtures::PUBLIC_KEY_A_PEM);

        fetcher.set_pem(fixtures::PUBLIC_KEY_B_PEM);
        let hit = cache.get_public_key().await.unwrap();
        assert_eq!(hit.pem(), fixtures::PUBLIC_KEY_A_PEM);

        let mut rotated = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !cache.is_refreshing()
                && cache.get_public_key().await.unwrap().pem() == fixtures::PUBLIC_KEY_B_PEM
            {
                rotated = true;
                break;
            }
        }
        assert!(rotated, "background refresh should install the new key");

        cache.shutdown().await;
        assert!(!cache.is_refreshing());
    }

    /// Validates `PublicKeyCache::invalidate` behavior for the hook scenario.
    ///
    /// Assertions:
    /// - Confirms the hook runs once per invalidation.
    /// - Ensures the entry is cleared even when the hook fails.
    #[tokio::test]
    async fn test_invalidate_runs_hook() {
        let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
        let cache = PublicKeyCache::new(Arc::clone(&fetcher) as Arc<dyn KeyFetcher>);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        cache.set_invalidate_hook(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        cache.get_public_key().await.unwrap();
        cache.invalidate().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.cache_info().await.has_key);

        cache.set_invalidate_hook(|| Err("sync failed".to_string()));
        cache.get_public_key().await.unwrap();
        let err = cache.invalidate().await.unwrap_err();
        assert_eq!(err, AuthError::InvalidationHook("sync failed".into()));
        assert!(!cache.cache_info().await.has_key);
    }
}
