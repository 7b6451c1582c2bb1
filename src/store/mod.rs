/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Shared fast store contract.
//!
//! The store is an in-memory key-value service reachable by every application
//! instance. The crate depends on three guarantees from it:
//!
//! - single-key commands are atomic,
//! - TTL-bearing keys disappear once their lease runs out,
//! - a [`StoreScript`] runs indivisibly: no other command observes a partial
//!   result.
//!
//! Any backend offering these primitives is interchangeable. Two are provided:
//! [`InMemoryStore`] (single process, tests and demos) and, behind the `redis`
//! feature, [`RedisStore`].

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod script;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use script::StoreScript;

/// Store handle shared by every service object.
pub type SharedStore = Arc<dyn FastStore>;

/// Errors reported by a [`FastStore`] backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The key holds a value of another type.
    #[error("wrong type for key {key}")]
    WrongType {
        /// Offending key.
        key: String,
    },

    /// An increment targeted a value that is not an integer.
    #[error("value at key {key} is not an integer")]
    NotAnInteger {
        /// Offending key.
        key: String,
    },

    /// A script returned a reply the caller does not understand.
    #[error("unexpected script reply {reply} from {script}")]
    UnexpectedReply {
        /// Script name.
        script: &'static str,
        /// Raw reply.
        reply: i64,
    },

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` when the failure is a connectivity problem.
    #[inline]
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Primitive operations of the shared fast store.
///
/// All methods are single round-trips. Multi-step read-modify-write sequences
/// must go through [`FastStore::eval`].
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Returns the string stored at `key`, or `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores a string value. `ttl = None` keeps the key until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Stores `value` only if `key` is absent. Returns `true` when the value
    /// was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Removes `key`. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically increments the integer at `key` (missing keys start at 0)
    /// and returns the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Remaining time to live, `None` if the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Sets one field of the hash at `key`.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Returns every field of the hash at `key` (empty when absent).
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Adds `member` to the set at `key`. Returns `true` if it was new.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Tests membership in the set at `key`.
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Cardinality of the set at `key`.
    async fn scard(&self, key: &str) -> Result<u64, StoreError>;

    /// Adds or updates `member` in the sorted set at `key`. Returns `true` if
    /// the member was new.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, StoreError>;

    /// Score of `member`, if present.
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;

    /// Members ranked `start..=stop` by ascending score.
    async fn zrange(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    /// Runs an atomic script and returns its integer reply.
    async fn eval(&self, script: &StoreScript) -> Result<i64, StoreError>;
}
