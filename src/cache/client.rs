/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Cache-aside client.

use super::entry::{LogicalEntry, deadline_after};
use crate::lock::{DistributedLock, LockToken};
use crate::retry::RetryPolicy;
use crate::store::{SharedStore, StoreError};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

/// Error type returned by entity loaders.
pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Marker stored for entities known to be absent.
const NULL_MARKER: &str = "";

/// Errors that can occur during cached reads and writes.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The shared store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A cached document could not be decoded.
    #[error("malformed cache entry at {key}: {source}")]
    Malformed {
        /// Cache key.
        key: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for caching.
    #[error("cannot encode value for {key}: {source}")]
    Encode {
        /// Cache key.
        key: String,
        /// Encoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The loader failed while rebuilding an entry.
    #[error("loader failed for {key}: {source}")]
    Loader {
        /// Cache key.
        key: String,
        /// Loader failure.
        #[source]
        source: LoaderError,
    },

    /// The rebuild lock stayed busy for the whole retry budget.
    #[error("rebuild lock for {key} not acquired after {attempts} attempts")]
    LockAcquisitionFailed {
        /// Cache key.
        key: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// Tunables of a [`CacheClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of the "not found" marker.
    pub null_ttl: Duration,
    /// Lease of the per-key rebuild lock.
    pub rebuild_lock_lease: Duration,
    /// Wait schedule of the mutex strategy while another caller rebuilds.
    pub lock_retry: RetryPolicy,
    /// Maximum number of concurrent logical-expiry rebuilds.
    pub rebuild_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            null_ttl: Duration::from_secs(2 * 60),
            rebuild_lock_lease: Duration::from_secs(10),
            lock_retry: RetryPolicy::fixed(200, Duration::from_millis(50)),
            rebuild_workers: 10,
        }
    }
}

/// A rebuild worker slot plus the rebuild lock of one key.
struct RebuildClaim {
    _permit: OwnedSemaphorePermit,
    resource: String,
    token: LockToken,
}

enum Lookup {
    Hit(String),
    Null,
    Miss,
}

/// Read-through cache over the shared store.
///
/// Constructed once and shared; the logical-expiry rebuild pool is owned by
/// the client and bounded by [`CacheConfig::rebuild_workers`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use seckill_rs::cache::{CacheClient, CacheConfig, LoaderError};
/// use seckill_rs::store::InMemoryStore;
///
/// # async fn example() -> Result<(), seckill_rs::CacheError> {
/// let cache = CacheClient::new(Arc::new(InMemoryStore::new()), CacheConfig::default());
/// let name: Option<String> = cache
///     .query_with_mutex("cache:shop:", 1u64, Duration::from_secs(1800), |id| async move {
///         Ok::<_, LoaderError>(Some(format!("shop {id}")))
///     })
///     .await?;
/// assert_eq!(name.as_deref(), Some("shop 1"));
/// # Ok(())
/// # }
/// ```
pub struct CacheClient {
    store: SharedStore,
    locks: Arc<DistributedLock>,
    rebuilds: Arc<Semaphore>,
    config: CacheConfig,
}

impl CacheClient {
    /// Creates a client over `store`.
    #[must_use]
    pub fn new(store: SharedStore, config: CacheConfig) -> Self {
        // rebuild locks are named `{prefix}lock:{id}` without the global lock prefix
        let locks = Arc::new(DistributedLock::with_namespace(store.clone(), ""));
        let rebuilds = Arc::new(Semaphore::new(config.rebuild_workers.max(1)));
        Self {
            store,
            locks,
            rebuilds,
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stores `value` as JSON with a store TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if encoding or the store write fails.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = encode(key, value)?;
        self.store.set(key, &json, Some(ttl)).await?;
        Ok(())
    }

    /// Stores `value` wrapped in a [`LogicalEntry`] expiring `ttl` from now,
    /// without a store TTL. Used to pre-warm hot keys.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if encoding or the store write fails.
    pub async fn set_with_logical_expiry<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = encode_logical(key, value, ttl)?;
        self.store.set(key, &json, None).await?;
        Ok(())
    }

    /// Drops the entry of `prefix + id`. Call after updating the system of
    /// record so the next read rebuilds.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] if the store cannot be reached.
    pub async fn invalidate(&self, prefix: &str, id: impl Display) -> Result<bool, CacheError> {
        let key = format!("{prefix}{id}");
        let removed = self.store.delete(&key).await?;
        debug!(%key, removed, "cache entry invalidated");
        Ok(removed)
    }

    /// Read-through with "not found" caching and no rebuild coordination.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on store, codec or loader failure.
    pub async fn query_with_pass_through<T, Id, F, Fut>(
        &self,
        prefix: &str,
        id: Id,
        ttl: Duration,
        loader: F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        Id: Display,
        F: Fn(Id) -> Fut,
        Fut: Future<Output = Result<Option<T>, LoaderError>>,
    {
        let key = format!("{prefix}{id}");
        match self.lookup(&key).await? {
            Lookup::Hit(raw) => decode(&key, &raw).map(Some),
            Lookup::Null => Ok(None),
            Lookup::Miss => self.load_and_store(&key, id, ttl, &loader).await,
        }
    }

    /// Read-through where a single caller rebuilds a missing entry.
    ///
    /// On a miss the caller races for the rebuild lock `prefix + "lock:" + id`.
    /// The winner re-checks the cache, runs `loader` and writes either the
    /// entity (with `ttl`) or the "not found" marker. Losers sleep per
    /// [`CacheConfig::lock_retry`] and start over.
    ///
    /// # Errors
    ///
    /// - [`CacheError::LockAcquisitionFailed`] if the retry budget runs out
    /// - [`CacheError::Loader`] if the loader fails (the lock is released)
    /// - [`CacheError::Store`], [`CacheError::Malformed`], [`CacheError::Encode`]
    pub async fn query_with_mutex<T, Id, F, Fut>(
        &self,
        prefix: &str,
        id: Id,
        ttl: Duration,
        loader: F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        Id: Display + Clone,
        F: Fn(Id) -> Fut,
        Fut: Future<Output = Result<Option<T>, LoaderError>>,
    {
        let key = format!("{prefix}{id}");
        let resource = rebuild_lock_resource(prefix, &id);
        let policy = self.config.lock_retry;
        let mut attempts = 0u32;

        loop {
            match self.lookup(&key).await? {
                Lookup::Hit(raw) => return decode(&key, &raw).map(Some),
                Lookup::Null => return Ok(None),
                Lookup::Miss => {}
            }

            if let Some(token) = self
                .locks
                .try_lock(&resource, self.config.rebuild_lock_lease)
                .await?
            {
                let result = self.rebuild_locked(&key, id.clone(), ttl, &loader).await;
                release(&self.locks, &resource, &token).await;
                return result;
            }

            attempts = attempts.saturating_add(1);
            if !policy.allows_retry(attempts) {
                warn!(%key, attempts, "gave up waiting for cache rebuild");
                return Err(CacheError::LockAcquisitionFailed { key, attempts });
            }
            debug!(%key, attempts, "rebuild in progress elsewhere, retrying");
            tokio::time::sleep(policy.backoff_delay(attempts - 1)).await;
        }
    }

    /// Non-blocking read of a pre-warmed [`LogicalEntry`].
    ///
    /// A missing key returns `Ok(None)` without calling the loader. A fresh
    /// entry is returned as is. An expired entry is returned as is too, after
    /// scheduling at most one background rebuild: the caller that gets a free
    /// rebuild worker and wins the rebuild lock hands the refresh to that
    /// worker, everyone else serves the stale value. When every worker is
    /// busy no lock is taken and the stale value is served.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] or [`CacheError::Malformed`]; loader
    /// failures happen in the background and are only logged.
    pub async fn query_with_logical_expiry<T, Id, F, Fut>(
        &self,
        prefix: &str,
        id: Id,
        ttl: Duration,
        loader: F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        Id: Display + Send + 'static,
        F: Fn(Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, LoaderError>> + Send + 'static,
    {
        let key = format!("{prefix}{id}");
        let Lookup::Hit(raw) = self.lookup(&key).await? else {
            return Ok(None);
        };
        let entry: LogicalEntry<T> = decode(&key, &raw)?;
        if !entry.is_expired() {
            return Ok(Some(entry.data));
        }

        // the lease must not start ticking while the rebuild waits for a worker
        let Ok(permit) = self.rebuilds.clone().try_acquire_owned() else {
            debug!(%key, "rebuild pool saturated, serving stale entry");
            return Ok(Some(entry.data));
        };
        let resource = rebuild_lock_resource(prefix, &id);
        let Some(token) = self
            .locks
            .try_lock(&resource, self.config.rebuild_lock_lease)
            .await?
        else {
            debug!(%key, "serving stale entry while another caller rebuilds");
            return Ok(Some(entry.data));
        };

        // another caller may have refreshed between our read and the lock
        let current = match self.lookup(&key).await {
            Ok(lookup) => lookup,
            Err(e) => {
                release(&self.locks, &resource, &token).await;
                return Err(e);
            }
        };
        match current {
            Lookup::Hit(raw) => match decode::<LogicalEntry<T>>(&key, &raw) {
                Ok(latest) if !latest.is_expired() => {
                    release(&self.locks, &resource, &token).await;
                    return Ok(Some(latest.data));
                }
                Ok(_) => {}
                Err(e) => {
                    release(&self.locks, &resource, &token).await;
                    return Err(e);
                }
            },
            Lookup::Null | Lookup::Miss => {
                release(&self.locks, &resource, &token).await;
                return Ok(None);
            }
        }

        let claim = RebuildClaim {
            _permit: permit,
            resource,
            token,
        };
        self.spawn_logical_rebuild(claim, key, id, ttl, loader);
        Ok(Some(entry.data))
    }

    fn spawn_logical_rebuild<T, Id, F, Fut>(
        &self,
        claim: RebuildClaim,
        key: String,
        id: Id,
        ttl: Duration,
        loader: F,
    ) where
        T: Serialize + Send + 'static,
        Id: Send + 'static,
        F: Fn(Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, LoaderError>> + Send + 'static,
    {
        let store = self.store.clone();
        let locks = self.locks.clone();

        tokio::spawn(async move {
            match loader(id).await {
                Ok(Some(value)) => match encode_logical(&key, &value, ttl) {
                    Ok(json) => match store.set(&key, &json, None).await {
                        Ok(()) => debug!(%key, "logical entry rebuilt"),
                        Err(e) => error!(%key, error = %e, "failed to write rebuilt entry"),
                    },
                    Err(e) => error!(%key, error = %e, "failed to encode rebuilt entry"),
                },
                Ok(None) => match store.delete(&key).await {
                    Ok(_) => info!(%key, "entity no longer exists, entry dropped"),
                    Err(e) => error!(%key, error = %e, "failed to drop vanished entry"),
                },
                Err(e) => error!(%key, error = %e, "logical rebuild loader failed"),
            }
            release(&locks, &claim.resource, &claim.token).await;
        });
    }

    async fn lookup(&self, key: &str) -> Result<Lookup, CacheError> {
        Ok(match self.store.get(key).await? {
            None => Lookup::Miss,
            Some(raw) if raw.trim().is_empty() => Lookup::Null,
            Some(raw) => Lookup::Hit(raw),
        })
    }

    async fn rebuild_locked<T, Id, F, Fut>(
        &self,
        key: &str,
        id: Id,
        ttl: Duration,
        loader: &F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Id) -> Fut,
        Fut: Future<Output = Result<Option<T>, LoaderError>>,
    {
        match self.lookup(key).await? {
            Lookup::Hit(raw) => decode(key, &raw).map(Some),
            Lookup::Null => Ok(None),
            Lookup::Miss => self.load_and_store(key, id, ttl, loader).await,
        }
    }

    async fn load_and_store<T, Id, F, Fut>(
        &self,
        key: &str,
        id: Id,
        ttl: Duration,
        loader: &F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize,
        F: Fn(Id) -> Fut,
        Fut: Future<Output = Result<Option<T>, LoaderError>>,
    {
        let loaded = loader(id).await.map_err(|source| CacheError::Loader {
            key: key.to_string(),
            source,
        })?;
        match loaded {
            None => {
                self.store
                    .set(key, NULL_MARKER, Some(self.config.null_ttl))
                    .await?;
                debug!(%key, "caching not-found marker");
                Ok(None)
            }
            Some(value) => {
                self.set_with_ttl(key, &value, ttl).await?;
                debug!(%key, "cache entry rebuilt");
                Ok(Some(value))
            }
        }
    }
}

fn rebuild_lock_resource(prefix: &str, id: &impl Display) -> String {
    format!("{prefix}lock:{id}")
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|source| CacheError::Encode {
        key: key.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, CacheError> {
    serde_json::from_str(raw).map_err(|source| CacheError::Malformed {
        key: key.to_string(),
        source,
    })
}

fn encode_logical<T: Serialize>(key: &str, value: &T, ttl: Duration) -> Result<String, CacheError> {
    let entry = LogicalEntry::expiring_at(value, deadline_after(Utc::now(), ttl));
    encode(key, &entry)
}

async fn release(locks: &DistributedLock, resource: &str, token: &LockToken) {
    if let Err(e) = locks.unlock(resource, token).await {
        warn!(resource, error = %e, "rebuild lock not released, lease will expire");
    }
}
