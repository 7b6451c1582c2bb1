/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Result of processing one queued order.

use super::order::OrderState;
use crate::repository::PersistenceError;
use crate::store::StoreError;
use thiserror::Error;

/// Failure of a single fulfillment attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    /// The system of record rejected or failed the write.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The store backing the per-user lease failed.
    #[error("per-user lease unavailable: {0}")]
    Store(#[from] StoreError),

    /// The per-user lease stayed busy for the whole lock retry budget.
    #[error("per-user lease for user {user_id} still held after {attempts} attempts")]
    LockBusy {
        /// Buyer whose lease was contended.
        user_id: u64,
        /// Acquisition attempts made.
        attempts: u32,
    },
}

impl FulfillmentError {
    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(error) => error.is_retryable(),
            Self::Store(_) | Self::LockBusy { .. } => true,
        }
    }
}

/// What the worker did with an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Stock decremented and order row inserted.
    Persisted {
        /// Attempts used, including the successful one.
        attempts: u32,
    },

    /// The buyer already had an order row for this voucher; nothing written.
    SkippedDuplicate,

    /// Retries exhausted or a terminal error; handed to reconciliation.
    Abandoned {
        /// Last error seen.
        error: FulfillmentError,
        /// Attempts made.
        attempts: u32,
    },
}

impl FulfillmentOutcome {
    /// Durability state of the order after this outcome.
    #[must_use]
    pub fn state(&self) -> OrderState {
        match self {
            Self::Persisted { .. } | Self::SkippedDuplicate => OrderState::Persisted,
            Self::Abandoned { .. } => OrderState::Reserved,
        }
    }

    /// Returns `true` if the order row was written by this attempt.
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    /// Returns `true` if the order went to reconciliation.
    #[inline]
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }
}
