/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! In-process [`FastStore`] backend.
//!
//! Keys live in a [`DashMap`], so single-key commands only contend on their
//! shard. Scripts take an exclusive gate that every command otherwise holds in
//! shared mode, which makes a script indivisible with respect to all other
//! traffic, the same way a single-threaded store serializes scripts.
//!
//! Expiry is lazy: an expired key is purged the next time it is touched.

use super::script::{ADMIT_DUPLICATE, ADMIT_GRANTED, ADMIT_OUT_OF_STOCK, StoreScript};
use super::{FastStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    Sorted(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Single-process implementation of the shared fast store.
///
/// # Examples
///
/// ```
/// use seckill_rs::store::{FastStore, InMemoryStore};
///
/// # async fn example() -> Result<(), seckill_rs::StoreError> {
/// let store = InMemoryStore::new();
/// assert_eq!(store.incr("icr:order:2026:10:17").await?, 1);
/// assert_eq!(store.incr("icr:order:2026:10:17").await?, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
    gate: RwLock<()>,
    online: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            gate: RwLock::new(()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulates loss (`false`) or recovery (`true`) of connectivity.
    ///
    /// While offline every command fails with [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of keys currently held, including expired keys not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        }
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, ()>, StoreError> {
        self.check_online()?;
        Ok(self.gate.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>, StoreError> {
        self.check_online()?;
        Ok(self.gate.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn purge_expired(&self, key: &str) {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }

    fn read_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.purge_expired(key);
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Str(value) => Ok(Some(value.clone())),
                _ => Err(wrong_type(key)),
            },
        }
    }

    fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.purge_expired(key);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Str("0".to_string()), None));
        match &mut entry.value {
            Value::Str(raw) => {
                let current: i64 = raw.parse().map_err(|_| StoreError::NotAnInteger {
                    key: key.to_string(),
                })?;
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| StoreError::NotAnInteger {
                        key: key.to_string(),
                    })?;
                *raw = next.to_string();
                Ok(next)
            }
            _ => Err(wrong_type(key)),
        }
    }

    fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.purge_expired(key);
        match self.entries.get(key) {
            None => Ok(false),
            Some(entry) => match &entry.value {
                Value::Set(members) => Ok(members.contains(member)),
                _ => Err(wrong_type(key)),
            },
        }
    }

    fn add_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.purge_expired(key);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Set(HashSet::new()), None));
        match &mut entry.value {
            Value::Set(members) => Ok(members.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    fn member_count(&self, key: &str) -> Result<u64, StoreError> {
        self.purge_expired(key);
        match self.entries.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.value {
                Value::Set(members) => Ok(members.len() as u64),
                _ => Err(wrong_type(key)),
            },
        }
    }

    fn remove_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.purge_expired(key);
        let removed = match self.entries.get_mut(key) {
            None => false,
            Some(mut entry) => match &mut entry.value {
                Value::Set(members) => members.remove(member),
                _ => return Err(wrong_type(key)),
            },
        };
        self.entries
            .remove_if(key, |_, entry| matches!(&entry.value, Value::Set(m) if m.is_empty()));
        Ok(removed)
    }

    fn run_script(&self, script: &StoreScript) -> Result<i64, StoreError> {
        match script {
            StoreScript::ReleaseLock { key, token } => {
                self.purge_expired(key);
                let removed = self.entries.remove_if(key, |_, entry| {
                    matches!(&entry.value, Value::Str(holder) if holder == token)
                });
                Ok(i64::from(removed.is_some()))
            }
            StoreScript::SeckillAdmit {
                stock_key,
                buyers_key,
                user_id,
            } => {
                let stock = self
                    .read_string(stock_key)?
                    .and_then(|raw| raw.parse::<i64>().ok());
                match stock {
                    Some(stock) if stock > 0 => {}
                    _ => return Ok(ADMIT_OUT_OF_STOCK),
                }
                if self.is_member(buyers_key, user_id)? {
                    return Ok(ADMIT_DUPLICATE);
                }
                self.incr_by(stock_key, -1)?;
                self.add_member(buyers_key, user_id)?;
                Ok(ADMIT_GRANTED)
            }
            StoreScript::SeckillRevert {
                stock_key,
                buyers_key,
                user_id,
            } => {
                if self.remove_member(buyers_key, user_id)? {
                    self.incr_by(stock_key, 1)?;
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            StoreScript::SeckillSeed {
                stock_key,
                buyers_key,
                stock,
            } => {
                let stock: i64 = stock.parse().map_err(|_| StoreError::NotAnInteger {
                    key: stock_key.clone(),
                })?;
                let taken = i64::try_from(self.member_count(buyers_key)?).unwrap_or(i64::MAX);
                let remaining = stock.saturating_sub(taken).max(0);
                self.entries.insert(
                    stock_key.clone(),
                    Entry::new(Value::Str(remaining.to_string()), None),
                );
                Ok(remaining)
            }
        }
    }
}

#[inline]
fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

#[async_trait]
impl FastStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _gate = self.shared()?;
        self.read_string(key)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let _gate = self.shared()?;
        self.entries.insert(
            key.to_string(),
            Entry::new(Value::Str(value.to_string()), ttl),
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry::new(Value::Str(value.to_string()), Some(ttl)));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        Ok(self.entries.remove(key).is_some())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let _gate = self.shared()?;
        self.incr_by(key, 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new()), None));
        match &mut entry.value {
            Value::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        match self.entries.get(key) {
            None => Ok(HashMap::new()),
            Some(entry) => match &entry.value {
                Value::Hash(fields) => Ok(fields.clone()),
                _ => Err(wrong_type(key)),
            },
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let _gate = self.shared()?;
        self.add_member(key, member)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let _gate = self.shared()?;
        self.is_member(key, member)
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let _gate = self.shared()?;
        self.member_count(key)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Sorted(HashMap::new()), None));
        match &mut entry.value {
            Value::Sorted(scores) => Ok(scores.insert(member.to_string(), score).is_none()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Sorted(scores) => Ok(scores.get(member).copied()),
                _ => Err(wrong_type(key)),
            },
        }
    }

    async fn zrange(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let _gate = self.shared()?;
        self.purge_expired(key);
        if stop < start {
            return Ok(Vec::new());
        }
        let mut ranked: Vec<(String, f64)> = match self.entries.get(key) {
            None => return Ok(Vec::new()),
            Some(entry) => match &entry.value {
                Value::Sorted(scores) => scores
                    .iter()
                    .map(|(member, score)| (member.clone(), *score))
                    .collect(),
                _ => return Err(wrong_type(key)),
            },
        };
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked
            .into_iter()
            .skip(start)
            .take(stop.saturating_sub(start).saturating_add(1))
            .collect())
    }

    async fn eval(&self, script: &StoreScript) -> Result<i64, StoreError> {
        let _gate = self.exclusive()?;
        let reply = self.run_script(script)?;
        trace!(script = script.name(), reply, "script executed");
        Ok(reply)
    }
}
