/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Atomic server-side scripts.
//!
//! Each variant carries its keys and arguments. Remote backends ship the Lua
//! source returned by [`StoreScript::lua`]; the in-memory backend executes an
//! equivalent native routine while holding its exclusive script gate.

/// Lease release: delete the key only if it still holds the caller's token.
///
/// Replies `1` when the key was deleted, `0` otherwise.
pub const RELEASE_LOCK_LUA: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
end
return 0
"#;

/// Seckill admission: stock check, duplicate check and reservation.
///
/// Replies `0` granted, `1` out of stock, `2` duplicate order.
pub const SECKILL_ADMIT_LUA: &str = r#"
local stock = tonumber(redis.call('get', KEYS[1]))
if stock == nil or stock <= 0 then
    return 1
end
if redis.call('sismember', KEYS[2], ARGV[1]) == 1 then
    return 2
end
redis.call('incrby', KEYS[1], -1)
redis.call('sadd', KEYS[2], ARGV[1])
return 0
"#;

/// Undo of a granted admission: give the unit back and forget the buyer.
///
/// Replies `1` when a reservation was reverted, `0` if there was none.
pub const SECKILL_REVERT_LUA: &str = r#"
if redis.call('srem', KEYS[2], ARGV[1]) == 1 then
    redis.call('incrby', KEYS[1], 1)
    return 1
end
return 0
"#;

/// Stock seeding: the counter becomes the published stock minus the units
/// already held by buyers, floored at zero.
///
/// Replies the seeded counter value.
pub const SECKILL_SEED_LUA: &str = r#"
local remaining = tonumber(ARGV[1]) - redis.call('scard', KEYS[2])
if remaining < 0 then
    remaining = 0
end
redis.call('set', KEYS[1], remaining)
return remaining
"#;

/// Reply code of [`StoreScript::SeckillAdmit`] when the unit was reserved.
pub const ADMIT_GRANTED: i64 = 0;
/// Reply code of [`StoreScript::SeckillAdmit`] when stock is exhausted.
pub const ADMIT_OUT_OF_STOCK: i64 = 1;
/// Reply code of [`StoreScript::SeckillAdmit`] when the user already bought.
pub const ADMIT_DUPLICATE: i64 = 2;

/// A script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreScript {
    /// Delete `key` if its value equals `token`.
    ReleaseLock {
        /// Lock key.
        key: String,
        /// Holder token presented by the caller.
        token: String,
    },

    /// Reserve one unit of `stock_key` for `user_id` unless it is sold out or
    /// the user is already a member of `buyers_key`.
    SeckillAdmit {
        /// Mirrored stock counter.
        stock_key: String,
        /// Set of users holding a reservation.
        buyers_key: String,
        /// Buyer.
        user_id: String,
    },

    /// Revert a reservation made by [`StoreScript::SeckillAdmit`].
    SeckillRevert {
        /// Mirrored stock counter.
        stock_key: String,
        /// Set of users holding a reservation.
        buyers_key: String,
        /// Buyer.
        user_id: String,
    },

    /// Set `stock_key` to `stock` less the members of `buyers_key`.
    SeckillSeed {
        /// Mirrored stock counter.
        stock_key: String,
        /// Set of users holding a reservation.
        buyers_key: String,
        /// Published stock, in decimal.
        stock: String,
    },
}

impl StoreScript {
    /// Short name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReleaseLock { .. } => "release_lock",
            Self::SeckillAdmit { .. } => "seckill_admit",
            Self::SeckillRevert { .. } => "seckill_revert",
            Self::SeckillSeed { .. } => "seckill_seed",
        }
    }

    /// Lua source executed by remote backends.
    #[must_use]
    pub fn lua(&self) -> &'static str {
        match self {
            Self::ReleaseLock { .. } => RELEASE_LOCK_LUA,
            Self::SeckillAdmit { .. } => SECKILL_ADMIT_LUA,
            Self::SeckillRevert { .. } => SECKILL_REVERT_LUA,
            Self::SeckillSeed { .. } => SECKILL_SEED_LUA,
        }
    }

    /// `KEYS` passed to the script, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::ReleaseLock { key, .. } => vec![key.as_str()],
            Self::SeckillAdmit {
                stock_key,
                buyers_key,
                ..
            }
            | Self::SeckillRevert {
                stock_key,
                buyers_key,
                ..
            }
            | Self::SeckillSeed {
                stock_key,
                buyers_key,
                ..
            } => vec![stock_key.as_str(), buyers_key.as_str()],
        }
    }

    /// `ARGV` passed to the script, in order.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::ReleaseLock { token, .. } => vec![token.as_str()],
            Self::SeckillAdmit { user_id, .. } | Self::SeckillRevert { user_id, .. } => {
                vec![user_id.as_str()]
            }
            Self::SeckillSeed { stock, .. } => vec![stock.as_str()],
        }
    }
}
