/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Atomic admission against the store mirror.

use super::voucher::{SeckillVoucher, buyers_key, stock_key, voucher_key};
use crate::store::script::{ADMIT_DUPLICATE, ADMIT_GRANTED, ADMIT_OUT_OF_STOCK};
use crate::store::{SharedStore, StoreError, StoreScript};
use tracing::{debug, info};

/// Decision of the admission script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Admission {
    /// One unit reserved for the buyer.
    Granted,
    /// Mirrored stock is zero.
    OutOfStock,
    /// The buyer already holds a reservation.
    DuplicateOrder,
}

impl Admission {
    fn from_reply(reply: i64) -> Result<Self, StoreError> {
        match reply {
            ADMIT_GRANTED => Ok(Self::Granted),
            ADMIT_OUT_OF_STOCK => Ok(Self::OutOfStock),
            ADMIT_DUPLICATE => Ok(Self::DuplicateOrder),
            reply => Err(StoreError::UnexpectedReply {
                script: "seckill_admit",
                reply,
            }),
        }
    }
}

/// Owner of the mirrored stock counter and buyer set.
///
/// These two keys are written only here, and only inside store scripts:
/// [`publish`](Self::publish) seeds the counter, [`admit`](Self::admit) and
/// [`revert`](Self::revert) change both.
#[derive(Clone)]
pub struct AdmissionScript {
    store: SharedStore,
}

impl AdmissionScript {
    /// Creates the wrapper.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Checks stock, checks the buyer set and reserves one unit, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or replies with an
    /// unknown code. Nothing was reserved in that case.
    pub async fn admit(&self, voucher_id: u64, user_id: u64) -> Result<Admission, StoreError> {
        let script = StoreScript::SeckillAdmit {
            stock_key: stock_key(voucher_id),
            buyers_key: buyers_key(voucher_id),
            user_id: user_id.to_string(),
        };
        let admission = Admission::from_reply(self.store.eval(&script).await?)?;
        debug!(voucher_id, user_id, ?admission, "admission decided");
        Ok(admission)
    }

    /// Gives back the unit reserved for `user_id`.
    ///
    /// Returns `false` if the buyer held no reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub async fn revert(&self, voucher_id: u64, user_id: u64) -> Result<bool, StoreError> {
        let script = StoreScript::SeckillRevert {
            stock_key: stock_key(voucher_id),
            buyers_key: buyers_key(voucher_id),
            user_id: user_id.to_string(),
        };
        let reverted = self.store.eval(&script).await? == 1;
        debug!(voucher_id, user_id, reverted, "admission reverted");
        Ok(reverted)
    }

    /// Seeds the stock counter and the activation window of `voucher`.
    ///
    /// The counter is set to `voucher.stock` minus the buyers already
    /// holding a reservation, so republishing mid-sale never grants more than
    /// `voucher.stock` units in total. The buyer set is left untouched.
    ///
    /// Returns the seeded counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub async fn publish(&self, voucher: &SeckillVoucher) -> Result<i64, StoreError> {
        let key = voucher_key(voucher.voucher_id);
        for (field, value) in voucher.to_fields() {
            self.store.hset(&key, field, &value).await?;
        }
        let seed = StoreScript::SeckillSeed {
            stock_key: stock_key(voucher.voucher_id),
            buyers_key: buyers_key(voucher.voucher_id),
            stock: voucher.stock.to_string(),
        };
        let remaining = self.store.eval(&seed).await?;
        info!(
            voucher_id = voucher.voucher_id,
            stock = voucher.stock,
            remaining,
            begin = %voucher.begin_time,
            end = %voucher.end_time,
            "voucher published"
        );
        Ok(remaining)
    }

    /// Current mirrored stock, `None` if the voucher was never published.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or the counter is
    /// not an integer.
    pub async fn remaining_stock(&self, voucher_id: u64) -> Result<Option<i64>, StoreError> {
        let key = stock_key(voucher_id);
        match self.store.get(&key).await? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::NotAnInteger { key }),
        }
    }

    /// Number of buyers currently holding a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub async fn buyer_count(&self, voucher_id: u64) -> Result<u64, StoreError> {
        self.store.scard(&buyers_key(voucher_id)).await
    }

    /// Reads back a published voucher.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub async fn published_voucher(
        &self,
        voucher_id: u64,
    ) -> Result<Option<SeckillVoucher>, StoreError> {
        let fields = self.store.hget_all(&voucher_key(voucher_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(SeckillVoucher::from_fields(voucher_id, &fields))
    }
}
