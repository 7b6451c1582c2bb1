/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Logical-expiry envelope.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached document with an embedded staleness deadline.
///
/// The store keeps the key forever; readers compare `expire_at` with the
/// clock and decide whether a refresh is due.
///
/// # Examples
///
/// ```
/// use seckill_rs::cache::LogicalEntry;
/// use std::time::Duration;
///
/// let entry = LogicalEntry::new("shop", Duration::from_secs(30));
/// assert!(!entry.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalEntry<T> {
    /// Cached document.
    pub data: T,
    /// Moment after which the document is considered stale.
    pub expire_at: DateTime<Utc>,
}

impl<T> LogicalEntry<T> {
    /// Wraps `data` with a deadline `ttl` from now.
    #[must_use]
    pub fn new(data: T, ttl: Duration) -> Self {
        Self::expiring_at(data, deadline_after(Utc::now(), ttl))
    }

    /// Wraps `data` with an explicit deadline.
    #[must_use]
    pub fn expiring_at(data: T, expire_at: DateTime<Utc>) -> Self {
        Self { data, expire_at }
    }

    /// Returns `true` once the deadline has passed.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns `true` if the deadline is not after `now`.
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }
}

/// `now + ttl`, saturating at the largest representable instant.
#[must_use]
pub(crate) fn deadline_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
