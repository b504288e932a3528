//! Integration tests for the public-key cache
//!
//! Exercises concurrent misses, refresh-ahead and shutdown against a mock
//! key endpoint with artificial latency.

use std::sync::Arc;
use std::time::Duration;

use tiergate_common::auth::{KeyCacheConfig, KeyFetcher, PublicKeyCache};
use tiergate_common::testing::{fixtures, MockKeyFetcher};

fn cache(fetcher: &Arc<MockKeyFetcher>, ttl: Duration, refresh_ahead: Duration) -> PublicKeyCache {
    PublicKeyCache::with_config(
        Arc::clone(fetcher) as Arc<dyn KeyFetcher>,
        KeyCacheConfig { ttl, refresh_ahead },
    )
}

/// Validates that a burst of concurrent misses collapses into one fetch.
///
/// # Test Steps
/// 1. Start 32 tasks that all read an empty cache at once
/// 2. The mock endpoint takes 50ms per fetch
/// 3. Every task gets the key and the endpoint is hit once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_fetch_once() {
    let fetcher = Arc::new(
        MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM).with_delay(Duration::from_millis(50)),
    );
    let cache = cache(&fetcher, Duration::from_secs(300), Duration::from_secs(60));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_public_key().await })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task").expect("key");
    }

    assert_eq!(fetcher.fetch_count(), 1);
    assert!(cache.cache_info().await.is_valid);
}

/// Validates refresh-ahead replaces the key without blocking readers.
///
/// # Test Steps
/// 1. Cache key A with a TTL entirely inside the refresh-ahead window
/// 2. Rotate the endpoint to key B
/// 3. A read returns A immediately and starts a background fetch
/// 4. After the background fetch, reads return B
#[tokio::test(flavor = "multi_thread")]
async fn test_refresh_ahead_swaps_key_in_background() {
    let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
    let cache = cache(&fetcher, Duration::from_secs(30), Duration::from_secs(60));

    let first = cache.get_public_key().await.expect("initial fetch");
    fetcher.set_pem(fixtures::PUBLIC_KEY_B_PEM);

    let served = cache.get_public_key().await.expect("hit");
    assert_eq!(served.pem(), first.pem());

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let key = cache.get_public_key().await.expect("hit");
            if key.pem() == fixtures::PUBLIC_KEY_B_PEM {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("background refresh landed");

    cache.shutdown().await;
}

/// Validates shutdown joins an in-flight background refresh.
///
/// # Test Steps
/// 1. Warm the cache, then make the endpoint hang for 30s
/// 2. A hit inside the refresh-ahead window starts a background fetch
/// 3. Shutdown cancels it promptly and foreground reads still hit the cache
#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_cancels_background_refresh() {
    let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
    let cache = cache(&fetcher, Duration::from_secs(30), Duration::from_secs(60));
    cache.get_public_key().await.expect("warm");

    fetcher.set_delay(Some(Duration::from_secs(30)));
    cache.get_public_key().await.expect("hit");
    assert!(cache.is_refreshing());

    tokio::time::timeout(Duration::from_secs(2), cache.shutdown())
        .await
        .expect("shutdown is prompt");
    assert!(!cache.is_refreshing());

    cache.get_public_key().await.expect("foreground still served");
    assert!(!cache.is_refreshing());
}
