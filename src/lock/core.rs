/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Core distributed lock implementation.

use super::token::LockToken;
use crate::retry::RetryPolicy;
use crate::store::{SharedStore, StoreError, StoreScript};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Key prefix applied to resource names by [`DistributedLock::new`].
pub const DEFAULT_LOCK_NAMESPACE: &str = "lock:";

/// Lease-based lock over a [`SharedStore`].
///
/// One instance is created at process start and shared; every acquisition
/// yields a fresh [`LockToken`].
pub struct DistributedLock {
    store: SharedStore,
    namespace: String,
    holder: Uuid,
    acquisitions: AtomicU64,
}

impl DistributedLock {
    /// Creates a lock whose keys are `lock:` + resource.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self::with_namespace(store, DEFAULT_LOCK_NAMESPACE)
    }

    /// Creates a lock whose keys are `namespace` + resource.
    #[must_use]
    pub fn with_namespace(store: SharedStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            holder: Uuid::new_v4(),
            acquisitions: AtomicU64::new(1),
        }
    }

    /// Store key guarding `resource`.
    #[must_use]
    pub fn key_for(&self, resource: &str) -> String {
        format!("{}{}", self.namespace, resource)
    }

    fn next_token(&self) -> LockToken {
        let n = self.acquisitions.fetch_add(1, Ordering::Relaxed);
        LockToken::new(format!("{}-{}", self.holder.simple(), n))
    }

    /// Attempts to take the lease on `resource` for `lease`.
    ///
    /// Returns `Ok(None)` when another holder owns the lease.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    pub async fn try_lock(
        &self,
        resource: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>, StoreError> {
        let key = self.key_for(resource);
        let token = self.next_token();
        if self.store.set_if_absent(&key, token.as_str(), lease).await? {
            debug!(%key, %token, "lease acquired");
            Ok(Some(token))
        } else {
            debug!(%key, "lease held by another holder");
            Ok(None)
        }
    }

    /// Retries [`try_lock`](Self::try_lock) following `policy`.
    ///
    /// Returns `Ok(None)` once the retry budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    pub async fn lock_with_retry(
        &self,
        resource: &str,
        lease: Duration,
        policy: &RetryPolicy,
    ) -> Result<Option<LockToken>, StoreError> {
        let mut attempt = 0u32;
        loop {
            if let Some(token) = self.try_lock(resource, lease).await? {
                return Ok(Some(token));
            }
            attempt = attempt.saturating_add(1);
            if !policy.allows_retry(attempt) {
                return Ok(None);
            }
            tokio::time::sleep(policy.backoff_delay(attempt - 1)).await;
        }
    }

    /// Releases the lease on `resource` if it is still held by `token`.
    ///
    /// Returns `false` when the lease had already expired or belongs to
    /// someone else; in both cases nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    pub async fn unlock(&self, resource: &str, token: &LockToken) -> Result<bool, StoreError> {
        let key = self.key_for(resource);
        let script = StoreScript::ReleaseLock {
            key: key.clone(),
            token: token.as_str().to_string(),
        };
        let released = self.store.eval(&script).await? == 1;
        if released {
            debug!(%key, %token, "lease released");
        } else {
            warn!(%key, %token, "lease no longer owned at release");
        }
        Ok(released)
    }
}
