/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Reconciliation log for orders the worker could not persist.
//!
//! An entry means the buyer holds a reserved unit in the store mirror but no
//! order row exists in the system of record. Operators replay or refund
//! these out of band.

use super::order::VoucherOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// One order that needs manual reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    /// The order left in the reserved state.
    pub order: VoucherOrder,
    /// Last error, rendered.
    pub reason: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// When the worker gave up.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only sink for [`ReconciliationEntry`] values.
///
/// Implementations must preserve insertion order.
pub trait ReconciliationLog: Send + Sync {
    /// Appends an entry.
    fn record(&self, entry: ReconciliationEntry);

    /// Snapshot of all entries in insertion order.
    fn entries(&self) -> Vec<ReconciliationEntry>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns `true` if nothing was recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`ReconciliationLog`].
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use seckill_rs::fulfillment::{
///     InMemoryReconciliationLog, ReconciliationEntry, ReconciliationLog, VoucherOrder,
/// };
///
/// let log = InMemoryReconciliationLog::new();
/// log.record(ReconciliationEntry {
///     order: VoucherOrder::new(1, 2, 3),
///     reason: "database down".to_string(),
///     attempts: 5,
///     recorded_at: Utc::now(),
/// });
/// assert_eq!(log.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryReconciliationLog {
    entries: Mutex<Vec<ReconciliationEntry>>,
}

impl InMemoryReconciliationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReconciliationLog for InMemoryReconciliationLog {
    fn record(&self, entry: ReconciliationEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn entries(&self) -> Vec<ReconciliationEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
