/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! System-of-record collaborator.
//!
//! The durable relational store holding vouchers and orders. It is consumed
//! only by the fulfillment worker and by catalog management, never by the
//! admission path.

pub mod memory;

use crate::fulfillment::VoucherOrder;
use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryRepository;

/// Errors reported by an [`OrderRepository`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The system of record could not complete the write; retrying may help.
    #[error("system of record unavailable: {0}")]
    Unavailable(String),

    /// The voucher row has no stock left to decrement.
    #[error("voucher {voucher_id} has no stock left in the system of record")]
    StockExhausted {
        /// Voucher identifier.
        voucher_id: u64,
    },

    /// The voucher row does not exist.
    #[error("voucher {voucher_id} not found in the system of record")]
    VoucherNotFound {
        /// Voucher identifier.
        voucher_id: u64,
    },

    /// An order row with the same identifier already exists.
    #[error("order {order_id} already exists")]
    DuplicateOrder {
        /// Order identifier.
        order_id: u64,
    },
}

impl PersistenceError {
    /// Returns `true` if the same write may succeed later.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Voucher and order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Current stock of `voucher_id`, `None` if the voucher does not exist.
    async fn get_voucher_stock(&self, voucher_id: u64) -> Result<Option<i64>, PersistenceError>;

    /// Decrements stock by one if it is positive. Returns `false` when there
    /// was nothing to decrement.
    async fn decrement_stock_if_available(&self, voucher_id: u64)
    -> Result<bool, PersistenceError>;

    /// Inserts an order row.
    async fn insert_order(&self, order: &VoucherOrder) -> Result<(), PersistenceError>;

    /// Number of order rows for `(user_id, voucher_id)`.
    async fn count_orders(&self, user_id: u64, voucher_id: u64) -> Result<u64, PersistenceError>;

    /// Decrements stock and inserts `order` inside one transaction: either
    /// both writes are applied or neither is.
    async fn create_order(&self, order: &VoucherOrder) -> Result<(), PersistenceError>;
}
