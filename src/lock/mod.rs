/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Lease-based distributed mutual exclusion over the shared store.
//!
//! A lease is a TTL-bearing key holding an opaque holder token:
//!
//! - acquisition is a single set-if-absent with the lease as TTL,
//! - release is an atomic compare-and-delete script, so a holder whose lease
//!   already ran out can never delete the lease of the next holder,
//! - there is no reentrancy, upgrading or fairness; acquisition is a race and
//!   losers decide between retrying and failing fast.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use seckill_rs::lock::DistributedLock;
//! use seckill_rs::store::InMemoryStore;
//!
//! # async fn example() -> Result<(), seckill_rs::StoreError> {
//! let lock = DistributedLock::new(Arc::new(InMemoryStore::new()));
//! if let Some(token) = lock.try_lock("order:1001", Duration::from_secs(10)).await? {
//!     // critical section
//!     lock.unlock("order:1001", &token).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod token;

#[cfg(test)]
mod tests;

pub use self::core::{DEFAULT_LOCK_NAMESPACE, DistributedLock};
pub use token::LockToken;
