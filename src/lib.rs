/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! # seckill-rs
//!
//! Flash-sale (seckill) order admission and fulfillment.
//!
//! Many concurrent clients compete for a strictly limited, time-windowed
//! stock of discount vouchers. The crate guarantees:
//!
//! - no over-sell beyond the published stock,
//! - at most one successful purchase per user per voucher,
//! - admission decided by a single store round-trip,
//! - durable order persistence that never blocks the admission path.
//!
//! # Architecture
//!
//! - [`store`]: the shared fast store contract. Every application instance
//!   talks to the same store; its atomic scripts are the only serialization
//!   point for admission.
//! - [`lock`]: lease-based distributed lock with owner-checked release.
//! - [`id`]: 64-bit order identifiers built from a second offset and a
//!   per-day store counter.
//! - [`cache`]: cache-aside reads with stampede protection (mutex rebuild and
//!   logical-expiry rebuild).
//! - [`seckill`]: the atomic admission script and the purchase API.
//! - [`fulfillment`]: bounded queue plus a single consumer that persists
//!   reserved orders to the [`repository`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use seckill_rs::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SeckillConfig::default();
//! let store: SharedStore = Arc::new(InMemoryStore::new());
//! let repository = Arc::new(InMemoryRepository::new());
//!
//! let pipeline = FulfillmentPipeline::new(
//!     repository.clone(),
//!     DistributedLock::new(store.clone()),
//!     config.fulfillment.clone(),
//! );
//! let service = SeckillService::new(store.clone(), pipeline.sender(), &config);
//! let handle = pipeline.spawn();
//!
//! let now = Utc::now();
//! let voucher = SeckillVoucher::new(7, 100, now - Duration::minutes(1), now + Duration::hours(1));
//! repository.add_voucher(voucher.voucher_id, voucher.stock);
//! service.publish_voucher(&voucher).await?;
//!
//! let order_id = service.purchase(7, 1001).await?;
//! println!("order {order_id} accepted");
//!
//! drop(service);
//! handle.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod fulfillment;
pub mod id;
pub mod lock;
pub mod logging;
pub mod repository;
pub mod retry;
pub mod seckill;
pub mod store;

pub use cache::{CacheClient, CacheConfig, CacheError};
pub use config::{ConfigError, SeckillConfig};
pub use fulfillment::{
    FulfillmentConfig, FulfillmentEvent, FulfillmentHandle, FulfillmentOutcome,
    FulfillmentPipeline, OrderSender, OrderState, OverflowPolicy, VoucherOrder,
};
pub use id::{DecodedId, IdError, IdGenerator};
pub use lock::{DistributedLock, LockToken};
pub use repository::{InMemoryRepository, OrderRepository, PersistenceError};
pub use retry::RetryPolicy;
pub use seckill::{Admission, AdmissionScript, SeckillError, SeckillService, SeckillVoucher};
pub use store::{FastStore, InMemoryStore, SharedStore, StoreError, StoreScript};

/// Convenience re-exports for wiring a service.
pub mod prelude {
    pub use crate::cache::{CacheClient, CacheConfig};
    pub use crate::config::SeckillConfig;
    pub use crate::fulfillment::{FulfillmentPipeline, InMemoryReconciliationLog, VoucherOrder};
    pub use crate::id::IdGenerator;
    pub use crate::lock::DistributedLock;
    pub use crate::repository::{InMemoryRepository, OrderRepository};
    pub use crate::seckill::{Admission, SeckillError, SeckillService, SeckillVoucher};
    pub use crate::store::{FastStore, InMemoryStore, SharedStore};
}
