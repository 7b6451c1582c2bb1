/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

use chrono::{Duration, Utc};
use criterion::{BatchSize, BenchmarkId, Criterion};
use seckill_rs::prelude::*;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn voucher(voucher_id: u64, stock: i64) -> SeckillVoucher {
    let now = Utc::now();
    SeckillVoucher::new(voucher_id, stock, now - Duration::minutes(1), now + Duration::days(1))
}

pub fn bench_admission(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("admission");

    for stock in [0i64, 1_000_000] {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let admission = seckill_rs::AdmissionScript::new(store);
        rt.block_on(admission.publish(&voucher(1, stock))).unwrap();
        let mut user_id = 0u64;

        group.bench_with_input(BenchmarkId::new("admit", stock), &stock, |b, _| {
            b.iter(|| {
                user_id += 1;
                let decision = rt.block_on(admission.admit(1, black_box(user_id))).unwrap();
                black_box(decision);
            });
        });
    }

    group.finish();
}

pub fn bench_purchase(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("purchase");

    group.bench_function("purchase_and_enqueue", |b| {
        b.iter_batched(
            || {
                let store: SharedStore = Arc::new(InMemoryStore::new());
                let repository = Arc::new(InMemoryRepository::new());
                let pipeline = FulfillmentPipeline::new(
                    repository,
                    DistributedLock::new(store.clone()),
                    SeckillConfig::default().fulfillment,
                );
                let service =
                    SeckillService::new(store, pipeline.sender(), &SeckillConfig::default());
                rt.block_on(service.publish_voucher(&voucher(1, 1_000)))
                    .unwrap();
                (service, pipeline)
            },
            |(service, pipeline)| {
                rt.block_on(async {
                    for user_id in 0..100u64 {
                        black_box(service.purchase(1, user_id).await.unwrap());
                    }
                });
                drop(pipeline);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

pub fn bench_id_generation(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("id_generation");

    let store: SharedStore = Arc::new(InMemoryStore::new());
    let ids = IdGenerator::new(store);

    group.bench_function("next_id", |b| {
        b.iter(|| {
            let id = rt.block_on(ids.next_id(black_box("order"))).unwrap();
            black_box(id);
        });
    });

    group.bench_function("decode", |b| {
        b.iter(|| black_box(IdGenerator::decode(black_box(0x0C1F_5A3B_0000_002A))));
    });

    group.finish();
}
