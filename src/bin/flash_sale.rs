/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Simulated flash sale against the in-memory store and repository.
//!
//! ```text
//! RUST_LOG=info cargo run --bin flash-sale -- 1000 100
//! ```
//!
//! Arguments: number of purchase attempts (default 2000) and stock
//! (default 100). Every tenth buyer retries once, so duplicates show up in
//! the tally.

use chrono::{Duration as TimeDelta, Utc};
use seckill_rs::fulfillment::ReconciliationLog;
use seckill_rs::logging::init_tracing;
use seckill_rs::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const VOUCHER_ID: u64 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct VoucherDetails {
    id: u64,
    title: String,
    pay_value: u64,
    actual_value: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let attempts: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(2000);
    let stock: i64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(100);

    let config = SeckillConfig::from_env().unwrap_or_else(|error| {
        warn!(%error, "falling back to default configuration");
        SeckillConfig::default()
    });

    let store: SharedStore = Arc::new(InMemoryStore::new());
    let repository = Arc::new(InMemoryRepository::new());

    let mut pipeline = FulfillmentPipeline::new(
        repository.clone(),
        DistributedLock::new(store.clone()),
        config.fulfillment.clone(),
    );
    let persisted = Arc::new(AtomicU64::new(0));
    let persisted_clone = persisted.clone();
    pipeline.add_listener(move |event| {
        if event.outcome.is_persisted() {
            persisted_clone.fetch_add(1, Ordering::Relaxed);
        }
    });
    let reconciliation = pipeline.reconciliation_log();

    let service = Arc::new(SeckillService::new(store.clone(), pipeline.sender(), &config));
    let handle = pipeline.spawn();

    let now = Utc::now();
    let voucher = SeckillVoucher::new(
        VOUCHER_ID,
        stock,
        now - TimeDelta::seconds(1),
        now + TimeDelta::hours(1),
    );
    repository.add_voucher(voucher.voucher_id, voucher.stock);
    service.publish_voucher(&voucher).await?;

    let cache = CacheClient::new(store.clone(), config.cache.clone());
    let details: Option<VoucherDetails> = cache
        .query_with_mutex("cache:voucher:", VOUCHER_ID, config.entity_ttl, |id| async move {
            Ok(Some(VoucherDetails {
                id,
                title: "Half price hotpot".to_string(),
                pay_value: 5_000,
                actual_value: 10_000,
            }))
        })
        .await?;
    info!(?details, "voucher details cached");

    let started = Instant::now();
    let mut buyers = Vec::with_capacity(attempts as usize);
    for n in 0..attempts {
        let service = service.clone();
        let user_id = if n % 10 == 9 { n - 1 } else { n };
        buyers.push(tokio::spawn(async move {
            service.purchase(VOUCHER_ID, user_id).await
        }));
    }

    let mut tally: BTreeMap<&'static str, u64> = BTreeMap::new();
    for buyer in buyers {
        let label = match buyer.await? {
            Ok(_) => "granted",
            Err(SeckillError::OutOfStock { .. }) => "out_of_stock",
            Err(SeckillError::DuplicateOrder { .. }) => "duplicate",
            Err(error) if error.is_retryable() => "retryable",
            Err(_) => "rejected",
        };
        *tally.entry(label).or_default() += 1;
    }
    let admission_time = started.elapsed();

    let remaining = service.admission().remaining_stock(VOUCHER_ID).await?;
    drop(service);
    let processed = tokio::time::timeout(Duration::from_secs(30), handle.wait()).await??;
    let db_stock = repository.get_voucher_stock(VOUCHER_ID).await?;

    info!(
        attempts,
        stock,
        ?tally,
        ?admission_time,
        ?remaining,
        processed,
        persisted = persisted.load(Ordering::Relaxed),
        rows = repository.order_count(),
        ?db_stock,
        reconciliation = reconciliation.len(),
        "flash sale finished"
    );
    Ok(())
}
