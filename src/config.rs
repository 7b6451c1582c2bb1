/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Service configuration.
//!
//! Every field has a default; [`SeckillConfig::from_env`] overrides them
//! from `SECKILL_*` variables:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `SECKILL_QUEUE_CAPACITY` | `fulfillment.queue_capacity` | 1048576 |
//! | `SECKILL_ENQUEUE_TIMEOUT_MS` | `fulfillment.overflow` (`0` = reject) | 100 |
//! | `SECKILL_USER_LOCK_LEASE_SECS` | `fulfillment.user_lock_lease` | 10 |
//! | `SECKILL_PERSIST_MAX_ATTEMPTS` | `fulfillment.persistence_retry.max_attempts` | 5 |
//! | `SECKILL_NULL_TTL_SECS` | `cache.null_ttl` | 120 |
//! | `SECKILL_REBUILD_LOCK_LEASE_SECS` | `cache.rebuild_lock_lease` | 10 |
//! | `SECKILL_REBUILD_WORKERS` | `cache.rebuild_workers` | 10 |
//! | `SECKILL_ENTITY_TTL_SECS` | `entity_ttl` | 1800 |
//! | `SECKILL_ID_EPOCH` | `id_epoch` | 1577836800 |
//! | `SECKILL_ORDER_NAMESPACE` | `order_namespace` | `order` |

use crate::cache::CacheConfig;
use crate::fulfillment::{FulfillmentConfig, OverflowPolicy};
use crate::id::DEFAULT_EPOCH_SECONDS;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeckillConfig {
    /// Cache-aside settings.
    pub cache: CacheConfig,
    /// Fulfillment pipeline settings.
    pub fulfillment: FulfillmentConfig,
    /// Epoch of order identifiers, in Unix seconds.
    pub id_epoch: i64,
    /// Counter namespace of order identifiers.
    pub order_namespace: String,
    /// Default TTL of cached entities.
    pub entity_ttl: Duration,
}

impl Default for SeckillConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            fulfillment: FulfillmentConfig::default(),
            id_epoch: DEFAULT_EPOCH_SECONDS,
            order_namespace: "order".to_string(),
            entity_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl SeckillConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first variable that is set
    /// but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(capacity) = try_load(&lookup, "SECKILL_QUEUE_CAPACITY")? {
            config.fulfillment.queue_capacity = capacity;
        }
        if let Some(ms) = try_load::<u64, _>(&lookup, "SECKILL_ENQUEUE_TIMEOUT_MS")? {
            config.fulfillment.overflow = if ms == 0 {
                OverflowPolicy::Reject
            } else {
                OverflowPolicy::Block {
                    timeout: Duration::from_millis(ms),
                }
            };
        }
        if let Some(secs) = try_load(&lookup, "SECKILL_USER_LOCK_LEASE_SECS")? {
            config.fulfillment.user_lock_lease = Duration::from_secs(secs);
        }
        if let Some(attempts) = try_load(&lookup, "SECKILL_PERSIST_MAX_ATTEMPTS")? {
            config.fulfillment.persistence_retry.max_attempts = attempts;
        }
        if let Some(secs) = try_load(&lookup, "SECKILL_NULL_TTL_SECS")? {
            config.cache.null_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = try_load(&lookup, "SECKILL_REBUILD_LOCK_LEASE_SECS")? {
            config.cache.rebuild_lock_lease = Duration::from_secs(secs);
        }
        if let Some(workers) = try_load(&lookup, "SECKILL_REBUILD_WORKERS")? {
            config.cache.rebuild_workers = workers;
        }
        if let Some(secs) = try_load(&lookup, "SECKILL_ENTITY_TTL_SECS")? {
            config.entity_ttl = Duration::from_secs(secs);
        }
        if let Some(epoch) = try_load(&lookup, "SECKILL_ID_EPOCH")? {
            config.id_epoch = epoch;
        }
        if let Some(namespace) = try_load::<String, _>(&lookup, "SECKILL_ORDER_NAMESPACE")? {
            config.order_namespace = namespace;
        }

        Ok(config)
    }
}

fn try_load<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        debug!("{key} not set, using default");
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}
