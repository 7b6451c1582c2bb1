/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Tests for the mutex rebuild strategy.

#[cfg(test)]
mod tests {
    use crate::cache::{CacheClient, CacheConfig, CacheError, LoaderError};
    use crate::retry::RetryPolicy;
    use crate::store::{FastStore, InMemoryStore};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const PREFIX: &str = "cache:shop:";
    const TTL: Duration = Duration::from_secs(30 * 60);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shop {
        id: u64,
        name: String,
    }

    fn config() -> CacheConfig {
        CacheConfig {
            lock_retry: RetryPolicy::fixed(500, Duration::from_millis(10)),
            ..CacheConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_stampede_loads_once() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(CacheClient::new(store, config()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .query_with_mutex(PREFIX, 1u64, TTL, move |id| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, LoaderError>(Some(Shop {
                                id,
                                name: "noodles".to_string(),
                            }))
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let shop = handle.await.unwrap().unwrap().unwrap();
            assert_eq!(shop.id, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hit_skips_loader() {
        let store = Arc::new(InMemoryStore::new());
        let cache = CacheClient::new(store, config());
        let cached = Shop {
            id: 2,
            name: "cached".to_string(),
        };
        cache
            .set_with_ttl("cache:shop:2", &cached, TTL)
            .await
            .unwrap();

        let shop: Option<Shop> = cache
            .query_with_mutex(PREFIX, 2u64, TTL, |_| async {
                Err::<Option<Shop>, LoaderError>("loader must not run".into())
            })
            .await
            .unwrap();
        assert_eq!(shop, Some(cached));
    }

    #[tokio::test]
    async fn test_missing_entity_caches_null_marker() {
        let store = Arc::new(InMemoryStore::new());
        let cache = CacheClient::new(store.clone(), config());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let shop: Option<Shop> = cache
                .query_with_mutex(PREFIX, 404u64, TTL, move |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, LoaderError>(None)
                    }
                })
                .await
                .unwrap();
            assert!(shop.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("cache:shop:404").await.unwrap().as_deref(), Some(""));
        let ttl = store.ttl("cache:shop:404").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(120));
        // the rebuild lock is released on the not-found path too
        assert_eq!(store.get("cache:shop:lock:404").await, Ok(None));
    }

    #[tokio::test]
    async fn test_loader_error_releases_lock() {
        let store = Arc::new(InMemoryStore::new());
        let cache = CacheClient::new(store.clone(), config());

        let result: Result<Option<Shop>, CacheError> = cache
            .query_with_mutex(PREFIX, 3u64, TTL, |_| async {
                Err::<Option<Shop>, LoaderError>("database down".into())
            })
            .await;
        assert!(matches!(result, Err(CacheError::Loader { .. })));
        assert_eq!(store.get("cache:shop:lock:3").await, Ok(None));
        assert_eq!(store.get("cache:shop:3").await, Ok(None));
    }

    #[tokio::test]
    async fn test_gives_up_when_lock_stays_busy() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set_if_absent("cache:shop:lock:5", "someone", Duration::from_secs(10))
            .await
            .unwrap();
        let cache = CacheClient::new(
            store,
            CacheConfig {
                lock_retry: RetryPolicy::fixed(3, Duration::from_millis(1)),
                ..CacheConfig::default()
            },
        );

        let result: Result<Option<Shop>, CacheError> = cache
            .query_with_mutex(PREFIX, 5u64, TTL, |_| async { Ok::<_, LoaderError>(None) })
            .await;
        assert!(matches!(
            result,
            Err(CacheError::LockAcquisitionFailed { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let store = Arc::new(InMemoryStore::new());
        let cache = CacheClient::new(store, config());
        let calls = Arc::new(AtomicUsize::new(0));

        for round in 0..2 {
            let calls = calls.clone();
            let shop: Option<Shop> = cache
                .query_with_mutex(PREFIX, 6u64, TTL, move |id| {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, LoaderError>(Some(Shop {
                            id,
                            name: format!("v{n}"),
                        }))
                    }
                })
                .await
                .unwrap();
            assert_eq!(shop.unwrap().name, format!("v{round}"));
            assert!(cache.invalidate(PREFIX, 6u64).await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_entry_reported() {
        let store = Arc::new(InMemoryStore::new());
        store.set("cache:shop:8", "{not json", None).await.unwrap();
        let cache = CacheClient::new(store, config());

        let result: Result<Option<Shop>, CacheError> = cache
            .query_with_mutex(PREFIX, 8u64, TTL, |_| async { Ok::<_, LoaderError>(None) })
            .await;
        assert!(matches!(result, Err(CacheError::Malformed { .. })));
    }
}
