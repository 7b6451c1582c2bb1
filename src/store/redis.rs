/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Redis-backed [`FastStore`].
//!
//! Uses a multiplexed [`ConnectionManager`] that reconnects on its own. The
//! Lua scripts are compiled once per store so `EVALSHA` is used after
//! the first invocation.

use super::script::{
    RELEASE_LOCK_LUA, SECKILL_ADMIT_LUA, SECKILL_REVERT_LUA, SECKILL_SEED_LUA, StoreScript,
};
use super::{FastStore, StoreError};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, RedisError, Script};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

struct Scripts {
    release_lock: Script,
    seckill_admit: Script,
    seckill_revert: Script,
    seckill_seed: Script,
}

impl Scripts {
    fn new() -> Self {
        Self {
            release_lock: Script::new(RELEASE_LOCK_LUA),
            seckill_admit: Script::new(SECKILL_ADMIT_LUA),
            seckill_revert: Script::new(SECKILL_REVERT_LUA),
            seckill_seed: Script::new(SECKILL_SEED_LUA),
        }
    }

    fn for_invocation(&self, script: &StoreScript) -> &Script {
        match script {
            StoreScript::ReleaseLock { .. } => &self.release_lock,
            StoreScript::SeckillAdmit { .. } => &self.seckill_admit,
            StoreScript::SeckillRevert { .. } => &self.seckill_revert,
            StoreScript::SeckillSeed { .. } => &self.seckill_seed,
        }
    }
}

/// Shared fast store backed by a Redis server.
pub struct RedisStore {
    connection: ConnectionManager,
    scripts: Scripts,
}

impl RedisStore {
    /// Connects to `redis_url` (for example `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str, retries: usize) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(retries);
        let client = Client::open(redis_url).map_err(map_error)?;
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(map_error)?;
        info!(redis_url, "connected to shared store");
        Ok(Self {
            connection,
            scripts: Scripts::new(),
        })
    }
}

fn map_error(error: RedisError) -> StoreError {
    if error.is_io_error()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
        || error.is_timeout()
    {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Backend(error.to_string())
    }
}

#[inline]
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl FastStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value);
        if let Some(ttl) = ttl {
            command.arg("PX").arg(millis(ttl));
        }
        command
            .query_async::<()>(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut connection)
            .await
            .map_err(map_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(map_error)?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("INCR")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut connection = self.connection.clone();
        let remaining: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(map_error)?;
        // -2: missing key, -1: no expiry
        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async::<()>(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let added: i64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut connection)
            .await
            .map_err(map_error)?;
        Ok(added > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("SCARD")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let added: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut connection)
            .await
            .map_err(map_error)?;
        Ok(added > 0)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn zrange(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("ZRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut connection)
            .await
            .map_err(map_error)
    }

    async fn eval(&self, script: &StoreScript) -> Result<i64, StoreError> {
        let mut connection = self.connection.clone();
        let mut invocation = self.scripts.for_invocation(script).prepare_invoke();
        for key in script.keys() {
            invocation.key(key);
        }
        for arg in script.args() {
            invocation.arg(arg);
        }
        invocation
            .invoke_async(&mut connection)
            .await
            .map_err(map_error)
    }
}
