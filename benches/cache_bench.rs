/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

use criterion::Criterion;
use seckill_rs::cache::LoaderError;
use seckill_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Shop {
    id: u64,
    name: String,
    score: u32,
}

pub fn bench_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let store: SharedStore = Arc::new(InMemoryStore::new());
    let cache = CacheClient::new(store, CacheConfig::default());
    let ttl = Duration::from_secs(30 * 60);
    let shop = Shop {
        id: 1,
        name: "103 tea house".to_string(),
        score: 37,
    };
    rt.block_on(cache.set_with_ttl("cache:shop:1", &shop, ttl))
        .unwrap();
    rt.block_on(cache.set_with_logical_expiry("cache:hot:1", &shop, ttl))
        .unwrap();

    let mut group = c.benchmark_group("cache_hit");

    group.bench_function("mutex", |b| {
        b.iter(|| {
            let hit: Option<Shop> = rt
                .block_on(cache.query_with_mutex("cache:shop:", 1u64, ttl, |_| async {
                    Err::<Option<Shop>, LoaderError>("miss".into())
                }))
                .unwrap();
            black_box(hit);
        });
    });

    group.bench_function("logical_expiry", |b| {
        b.iter(|| {
            let hit: Option<Shop> = rt
                .block_on(cache.query_with_logical_expiry("cache:hot:", 1u64, ttl, |_| async {
                    Err::<Option<Shop>, LoaderError>("miss".into())
                }))
                .unwrap();
            black_box(hit);
        });
    });

    group.finish();
}
