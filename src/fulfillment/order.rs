/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Order descriptor carried from admission to persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reserved voucher order.
///
/// Created once at admission time and never mutated afterwards. The buyer is
/// carried explicitly so the fulfillment worker never depends on request
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherOrder {
    /// Order identifier from the ID generator.
    pub id: u64,
    /// Buyer.
    pub user_id: u64,
    /// Purchased voucher.
    pub voucher_id: u64,
    /// Admission time.
    pub created_at: DateTime<Utc>,
}

impl VoucherOrder {
    /// Creates an order stamped with the current time.
    #[must_use]
    pub fn new(id: u64, user_id: u64, voucher_id: u64) -> Self {
        Self::with_created_at(id, user_id, voucher_id, Utc::now())
    }

    /// Creates an order with an explicit creation time.
    #[must_use]
    pub fn with_created_at(
        id: u64,
        user_id: u64,
        voucher_id: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            voucher_id,
            created_at,
        }
    }
}

/// Durability state of an order.
///
/// There is no failed state: an order that cannot be persisted stays
/// `Reserved` and goes to reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    /// Admission granted, not yet in the system of record.
    Reserved,
    /// Written to the system of record. Terminal.
    Persisted,
}
