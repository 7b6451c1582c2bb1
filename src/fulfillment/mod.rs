/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Order fulfillment pipeline.
//!
//! Admission decides; fulfillment persists. Every granted order is handed to
//! a bounded in-process FIFO queue, and a single worker task drains it into
//! the system of record. That worker is the only writer of order rows in the
//! process, which keeps persistence ordered and bounds the load on the
//! database.
//!
//! Per order the worker:
//!
//! 1. takes the per-user lease `lock:order:{user_id}`,
//! 2. re-checks that `(user_id, voucher_id)` has no order row yet,
//! 3. decrements stock and inserts the row in one transaction,
//! 4. releases the lease.
//!
//! Transient failures are retried with backoff. An order that still cannot
//! be written is logged under the `reconciliation` target and appended to
//! the [`ReconciliationLog`]; it is never reported back to the buyer, who was
//! already told the purchase succeeded.
//!
//! # Order lifecycle
//!
//! ```text
//! purchase ─► RESERVED ─► queue ─► worker ─► PERSISTED
//!                                    │
//!                                    └─► reconciliation (still RESERVED)
//! ```

mod core;
pub mod event;
pub mod order;
pub mod outcome;
pub mod reconciliation;

#[cfg(test)]
mod tests;

pub use self::core::{
    DEFAULT_QUEUE_CAPACITY, EnqueueError, FulfillmentConfig, FulfillmentHandle,
    FulfillmentPipeline, OrderSender, OverflowPolicy,
};
pub use event::FulfillmentEvent;
pub use order::{OrderState, VoucherOrder};
pub use outcome::{FulfillmentError, FulfillmentOutcome};
pub use reconciliation::{InMemoryReconciliationLog, ReconciliationEntry, ReconciliationLog};
