/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Flash-sale voucher and its store key layout.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix of the mirrored stock counter.
pub const STOCK_KEY_PREFIX: &str = "seckill:stock:";
/// Prefix of the per-voucher set of buyers holding a reservation.
pub const BUYERS_KEY_PREFIX: &str = "seckill:order:";
/// Prefix of the hash holding the activation window.
pub const VOUCHER_KEY_PREFIX: &str = "seckill:voucher:";

const FIELD_STOCK: &str = "stock";
const FIELD_BEGIN: &str = "begin_time";
const FIELD_END: &str = "end_time";

/// Mirrored stock counter key of `voucher_id`.
#[must_use]
pub fn stock_key(voucher_id: u64) -> String {
    format!("{STOCK_KEY_PREFIX}{voucher_id}")
}

/// Buyer set key of `voucher_id`.
#[must_use]
pub fn buyers_key(voucher_id: u64) -> String {
    format!("{BUYERS_KEY_PREFIX}{voucher_id}")
}

/// Activation window hash key of `voucher_id`.
#[must_use]
pub fn voucher_key(voucher_id: u64) -> String {
    format!("{VOUCHER_KEY_PREFIX}{voucher_id}")
}

/// Where a point in time falls relative to the activation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Before `begin_time`.
    NotStarted,
    /// Within `[begin_time, end_time)`.
    Open,
    /// At or after `end_time`.
    Ended,
}

/// A time-windowed voucher with limited stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeckillVoucher {
    /// Voucher identifier.
    pub voucher_id: u64,
    /// Units on sale.
    pub stock: i64,
    /// Start of the sale.
    pub begin_time: DateTime<Utc>,
    /// End of the sale.
    pub end_time: DateTime<Utc>,
}

impl SeckillVoucher {
    /// Creates a voucher.
    #[must_use]
    pub fn new(
        voucher_id: u64,
        stock: i64,
        begin_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            voucher_id,
            stock,
            begin_time,
            end_time,
        }
    }

    /// Window state at `now`.
    #[must_use]
    pub fn window_state_at(&self, now: DateTime<Utc>) -> WindowState {
        if now < self.begin_time {
            WindowState::NotStarted
        } else if now >= self.end_time {
            WindowState::Ended
        } else {
            WindowState::Open
        }
    }

    /// Returns `true` if the sale is running at `now`.
    #[inline]
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.window_state_at(now) == WindowState::Open
    }

    pub(crate) fn to_fields(&self) -> [(&'static str, String); 3] {
        [
            (FIELD_STOCK, self.stock.to_string()),
            (FIELD_BEGIN, self.begin_time.timestamp_millis().to_string()),
            (FIELD_END, self.end_time.timestamp_millis().to_string()),
        ]
    }

    pub(crate) fn from_fields(voucher_id: u64, fields: &HashMap<String, String>) -> Option<Self> {
        let millis = |field: &str| {
            fields
                .get(field)
                .and_then(|raw| raw.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        };
        Some(Self {
            voucher_id,
            stock: fields.get(FIELD_STOCK)?.parse().ok()?,
            begin_time: millis(FIELD_BEGIN)?,
            end_time: millis(FIELD_END)?,
        })
    }
}
