/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Purchase failures.

use crate::id::IdError;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a purchase was not accepted.
///
/// Every variant is decided before the order reaches the fulfillment
/// queue; no partial reservation survives a returned error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeckillError {
    /// No units left. Terminal.
    #[error("voucher {voucher_id} is sold out")]
    OutOfStock {
        /// Voucher identifier.
        voucher_id: u64,
    },

    /// The buyer already holds a unit of this voucher. Terminal.
    #[error("user {user_id} already purchased voucher {voucher_id}")]
    DuplicateOrder {
        /// Voucher identifier.
        voucher_id: u64,
        /// Buyer.
        user_id: u64,
    },

    /// The shared store could not be reached; the purchase fails closed.
    #[error("shared store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The store answered but its data or reply made no sense, for example a
    /// corrupt stock counter. Retrying does not help.
    #[error("shared store fault: {0}")]
    Internal(#[source] StoreError),

    /// The voucher was never published to the store.
    #[error("voucher {voucher_id} is not on sale")]
    VoucherNotFound {
        /// Voucher identifier.
        voucher_id: u64,
    },

    /// The sale has not started.
    #[error("sale of voucher {voucher_id} starts at {begin_time}")]
    NotStarted {
        /// Voucher identifier.
        voucher_id: u64,
        /// Start of the sale.
        begin_time: DateTime<Utc>,
    },

    /// The sale is over.
    #[error("sale of voucher {voucher_id} ended at {end_time}")]
    Ended {
        /// Voucher identifier.
        voucher_id: u64,
        /// End of the sale.
        end_time: DateTime<Utc>,
    },

    /// No order identifier could be produced.
    #[error("order id unavailable: {0}")]
    IdGeneration(#[source] IdError),

    /// The fulfillment queue stayed full; the reservation was given back.
    #[error("order queue full for voucher {voucher_id}, try again")]
    QueueFull {
        /// Voucher identifier.
        voucher_id: u64,
    },

    /// The fulfillment worker is gone; the reservation was given back.
    #[error("order pipeline closed")]
    PipelineClosed,
}

impl SeckillError {
    /// Returns `true` if the same purchase may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::QueueFull { .. })
    }
}

impl From<StoreError> for SeckillError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(_) => Self::StoreUnavailable(error),
            other => Self::Internal(other),
        }
    }
}

impl From<IdError> for SeckillError {
    fn from(error: IdError) -> Self {
        match error {
            IdError::Store(error) => Self::from(error),
            other => Self::IdGeneration(other),
        }
    }
}
