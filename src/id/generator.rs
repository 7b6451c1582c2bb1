/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Store-backed ID generator.

use crate::store::{SharedStore, StoreError};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::trace;

/// 2020-01-01T00:00:00Z.
pub const DEFAULT_EPOCH_SECONDS: i64 = 1_577_836_800;

/// Width of the counter field.
pub const COUNTER_BITS: u32 = 32;

/// Largest representable second offset (31 bits).
pub const MAX_TIMESTAMP: u64 = (1 << 31) - 1;

const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Errors that can occur while generating an ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The counter could not be incremented.
    #[error("id counter unavailable: {0}")]
    Store(#[from] StoreError),

    /// The clock is before the generator epoch or past the 31-bit range.
    #[error("clock {seconds}s outside the id range of epoch {epoch}")]
    ClockOutOfRange {
        /// Current Unix time in seconds.
        seconds: i64,
        /// Generator epoch in Unix seconds.
        epoch: i64,
    },

    /// More than 2^32 IDs were requested for one namespace within one day.
    #[error("daily id counter exhausted for {key}")]
    CounterExhausted {
        /// Counter key.
        key: String,
    },
}

/// The two fields of a generated ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedId {
    /// Seconds elapsed since the generator epoch.
    pub seconds_since_epoch: u64,
    /// Value of the daily counter.
    pub sequence: u64,
}

/// Generates ordered, collision-free 64-bit identifiers.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use seckill_rs::id::IdGenerator;
/// use seckill_rs::store::InMemoryStore;
///
/// # async fn example() -> Result<(), seckill_rs::IdError> {
/// let ids = IdGenerator::new(Arc::new(InMemoryStore::new()));
/// let first = ids.next_id("order").await?;
/// let second = ids.next_id("order").await?;
/// assert!(second > first);
/// # Ok(())
/// # }
/// ```
pub struct IdGenerator {
    store: SharedStore,
    epoch: i64,
}

impl IdGenerator {
    /// Creates a generator using [`DEFAULT_EPOCH_SECONDS`].
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self::with_epoch(store, DEFAULT_EPOCH_SECONDS)
    }

    /// Creates a generator with a custom epoch in Unix seconds.
    #[must_use]
    pub fn with_epoch(store: SharedStore, epoch: i64) -> Self {
        Self { store, epoch }
    }

    /// Counter key for `namespace` on the date of `now`.
    #[must_use]
    pub fn counter_key(namespace: &str, now: DateTime<Utc>) -> String {
        format!("icr:{}:{}", namespace, now.format("%Y:%m:%d"))
    }

    /// Returns the next ID of `namespace` at the current time.
    ///
    /// # Errors
    ///
    /// See [`next_id_at`](Self::next_id_at).
    pub async fn next_id(&self, namespace: &str) -> Result<u64, IdError> {
        self.next_id_at(namespace, Utc::now()).await
    }

    /// Returns the next ID of `namespace` as if generated at `now`.
    ///
    /// # Errors
    ///
    /// - [`IdError::Store`] if the counter cannot be incremented
    /// - [`IdError::ClockOutOfRange`] if `now` does not fit the timestamp field
    /// - [`IdError::CounterExhausted`] if the daily counter overflowed 32 bits
    pub async fn next_id_at(&self, namespace: &str, now: DateTime<Utc>) -> Result<u64, IdError> {
        let seconds = now.timestamp();
        let offset = seconds
            .checked_sub(self.epoch)
            .and_then(|offset| u64::try_from(offset).ok())
            .filter(|offset| *offset <= MAX_TIMESTAMP)
            .ok_or(IdError::ClockOutOfRange {
                seconds,
                epoch: self.epoch,
            })?;

        let key = Self::counter_key(namespace, now);
        let count = self.store.incr(&key).await?;
        let sequence = u64::try_from(count)
            .ok()
            .filter(|sequence| *sequence <= COUNTER_MASK)
            .ok_or_else(|| IdError::CounterExhausted { key: key.clone() })?;

        let id = Self::compose(offset, sequence);
        trace!(%key, id, "id generated");
        Ok(id)
    }

    /// Packs a second offset and a counter value into an ID.
    #[inline]
    #[must_use]
    pub fn compose(seconds_since_epoch: u64, sequence: u64) -> u64 {
        ((seconds_since_epoch & MAX_TIMESTAMP) << COUNTER_BITS) | (sequence & COUNTER_MASK)
    }

    /// Splits an ID into its fields.
    #[inline]
    #[must_use]
    pub fn decode(id: u64) -> DecodedId {
        DecodedId {
            seconds_since_epoch: (id >> COUNTER_BITS) & MAX_TIMESTAMP,
            sequence: id & COUNTER_MASK,
        }
    }

    /// Generation time of `id` for a generator with `epoch`.
    #[must_use]
    pub fn timestamp_of(id: u64, epoch: i64) -> Option<DateTime<Utc>> {
        let offset = i64::try_from(Self::decode(id).seconds_since_epoch).ok()?;
        DateTime::from_timestamp(epoch.checked_add(offset)?, 0)
    }
}
