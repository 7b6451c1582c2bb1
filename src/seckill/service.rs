/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Purchase API.

use super::admission::{Admission, AdmissionScript};
use super::error::SeckillError;
use super::voucher::{SeckillVoucher, WindowState};
use crate::config::SeckillConfig;
use crate::fulfillment::{EnqueueError, OrderSender, VoucherOrder};
use crate::id::IdGenerator;
use crate::store::SharedStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error, info};

/// Admission front door.
///
/// A purchase is decided by one store script; only a granted purchase gets
/// an order identifier and is handed to the fulfillment queue. If that
/// hand-off fails the reservation is reverted before the error is returned.
///
/// Activation windows are read from the store once per voucher and kept in
/// process.
pub struct SeckillService {
    admission: AdmissionScript,
    ids: IdGenerator,
    orders: OrderSender,
    namespace: String,
    vouchers: DashMap<u64, SeckillVoucher>,
}

impl SeckillService {
    /// Creates the service.
    #[must_use]
    pub fn new(store: SharedStore, orders: OrderSender, config: &SeckillConfig) -> Self {
        Self {
            admission: AdmissionScript::new(store.clone()),
            ids: IdGenerator::with_epoch(store, config.id_epoch),
            orders,
            namespace: config.order_namespace.clone(),
            vouchers: DashMap::new(),
        }
    }

    /// The admission script wrapper.
    #[must_use]
    pub fn admission(&self) -> &AdmissionScript {
        &self.admission
    }

    /// Mirrors stock and activation window of `voucher` into the store.
    ///
    /// # Errors
    ///
    /// Returns [`SeckillError::StoreUnavailable`] if the store is unreachable
    /// and [`SeckillError::Internal`] if it rejects the seed.
    pub async fn publish_voucher(&self, voucher: &SeckillVoucher) -> Result<(), SeckillError> {
        self.admission.publish(voucher).await?;
        self.vouchers.insert(voucher.voucher_id, voucher.clone());
        Ok(())
    }

    /// Buys one unit of `voucher_id` for `user_id`.
    ///
    /// Returns the order identifier. The order is persisted asynchronously.
    ///
    /// # Errors
    ///
    /// See [`SeckillError`]. Callers must not blindly retry a call that may
    /// have been granted: the retry is rejected as
    /// [`SeckillError::DuplicateOrder`].
    pub async fn purchase(&self, voucher_id: u64, user_id: u64) -> Result<u64, SeckillError> {
        self.purchase_at(voucher_id, user_id, Utc::now()).await
    }

    /// [`purchase`](Self::purchase) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`SeckillError`].
    pub async fn purchase_at(
        &self,
        voucher_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, SeckillError> {
        let voucher = self.voucher(voucher_id).await?;
        match voucher.window_state_at(now) {
            WindowState::Open => {}
            WindowState::NotStarted => {
                return Err(SeckillError::NotStarted {
                    voucher_id,
                    begin_time: voucher.begin_time,
                });
            }
            WindowState::Ended => {
                return Err(SeckillError::Ended {
                    voucher_id,
                    end_time: voucher.end_time,
                });
            }
        }

        match self.admission.admit(voucher_id, user_id).await? {
            Admission::Granted => {}
            Admission::OutOfStock => return Err(SeckillError::OutOfStock { voucher_id }),
            Admission::DuplicateOrder => {
                return Err(SeckillError::DuplicateOrder {
                    voucher_id,
                    user_id,
                });
            }
        }

        let order_id = match self.ids.next_id_at(&self.namespace, now).await {
            Ok(id) => id,
            Err(error) => {
                self.compensate(voucher_id, user_id).await;
                return Err(error.into());
            }
        };

        let order = VoucherOrder::with_created_at(order_id, user_id, voucher_id, now);
        if let Err(error) = self.orders.enqueue(order).await {
            self.compensate(voucher_id, user_id).await;
            return Err(match error {
                EnqueueError::Full(_) => SeckillError::QueueFull { voucher_id },
                EnqueueError::Closed(_) => SeckillError::PipelineClosed,
            });
        }

        debug!(voucher_id, user_id, order_id, "purchase accepted");
        Ok(order_id)
    }

    async fn voucher(&self, voucher_id: u64) -> Result<SeckillVoucher, SeckillError> {
        if let Some(voucher) = self.vouchers.get(&voucher_id) {
            return Ok(voucher.clone());
        }
        let voucher = self
            .admission
            .published_voucher(voucher_id)
            .await?
            .ok_or(SeckillError::VoucherNotFound { voucher_id })?;
        self.vouchers.insert(voucher_id, voucher.clone());
        Ok(voucher)
    }

    async fn compensate(&self, voucher_id: u64, user_id: u64) {
        match self.admission.revert(voucher_id, user_id).await {
            Ok(true) => info!(voucher_id, user_id, "reservation given back"),
            Ok(false) => error!(
                target: "reconciliation",
                voucher_id,
                user_id,
                "reservation to give back was missing"
            ),
            Err(error) => error!(
                target: "reconciliation",
                voucher_id,
                user_id,
                %error,
                "reservation could not be given back, mirrored stock is short by one"
            ),
        }
    }
}
