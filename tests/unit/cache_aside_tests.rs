/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

use seckill_rs::cache::{LoaderError, LogicalEntry};
use seckill_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shop {
        id: u64,
        name: String,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_instances_sharing_a_store_rebuild_once() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let instances: Vec<Arc<CacheClient>> = (0..3)
            .map(|_| Arc::new(CacheClient::new(store.clone(), CacheConfig::default())))
            .collect();
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for n in 0..60 {
            let cache = instances[n % instances.len()].clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .query_with_mutex(
                        "cache:shop:",
                        11u64,
                        Duration::from_secs(1800),
                        move |id| {
                            let loads = loads.clone();
                            async move {
                                loads.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(30)).await;
                                Ok::<_, LoaderError>(Some(Shop {
                                    id,
                                    name: "dumplings".to_string(),
                                }))
                            }
                        },
                    )
                    .await
            }));
        }

        for handle in handles {
            let shop = handle.await.unwrap().unwrap();
            assert_eq!(shop.map(|s| s.id), Some(11));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("cache:shop:lock:11").await, Ok(None));
    }

    #[tokio::test]
    async fn test_prewarmed_hot_key_round_trip() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let cache = CacheClient::new(store.clone(), CacheConfig::default());
        let shop = Shop {
            id: 1,
            name: "103 tea house".to_string(),
        };

        cache
            .set_with_logical_expiry("cache:shop:1", &shop, Duration::from_secs(20))
            .await
            .unwrap();
        assert_eq!(store.ttl("cache:shop:1").await, Ok(None));

        let raw = store.get("cache:shop:1").await.unwrap().unwrap();
        let entry: LogicalEntry<Shop> = serde_json::from_str(&raw).unwrap();
        assert!(!entry.is_expired());
        assert_eq!(entry.data, shop);

        let read: Option<Shop> = cache
            .query_with_logical_expiry("cache:shop:", 1u64, Duration::from_secs(20), |_| async {
                Err::<Option<Shop>, LoaderError>("not expected".into())
            })
            .await
            .unwrap();
        assert_eq!(read, Some(shop));
    }
}
