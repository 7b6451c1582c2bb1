/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! In-memory system of record.

use super::{OrderRepository, PersistenceError};
use crate::fulfillment::VoucherOrder;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Voucher stock and order rows kept in memory.
///
/// Transactions ([`OrderRepository::create_order`]) are serialized by a
/// single writer mutex; reads go straight to the maps.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    stock: DashMap<u64, i64>,
    orders: DashMap<u64, VoucherOrder>,
    tx: Mutex<()>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the voucher row.
    pub fn add_voucher(&self, voucher_id: u64, stock: i64) {
        self.stock.insert(voucher_id, stock);
    }

    /// Looks up an order row.
    #[must_use]
    pub fn get_order(&self, order_id: u64) -> Option<VoucherOrder> {
        self.orders.get(&order_id).map(|order| order.clone())
    }

    /// All order rows, ordered by identifier.
    #[must_use]
    pub fn orders(&self) -> Vec<VoucherOrder> {
        let mut orders: Vec<VoucherOrder> =
            self.orders.iter().map(|entry| entry.value().clone()).collect();
        orders.sort_by_key(|order| order.id);
        orders
    }

    /// Number of order rows.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn decrement(&self, voucher_id: u64) -> Result<bool, PersistenceError> {
        let mut stock = self
            .stock
            .get_mut(&voucher_id)
            .ok_or(PersistenceError::VoucherNotFound { voucher_id })?;
        if *stock > 0 {
            *stock -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn insert(&self, order: &VoucherOrder) -> Result<(), PersistenceError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(PersistenceError::DuplicateOrder { order_id: order.id }),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn get_voucher_stock(&self, voucher_id: u64) -> Result<Option<i64>, PersistenceError> {
        Ok(self.stock.get(&voucher_id).map(|stock| *stock))
    }

    async fn decrement_stock_if_available(
        &self,
        voucher_id: u64,
    ) -> Result<bool, PersistenceError> {
        let _tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        self.decrement(voucher_id)
    }

    async fn insert_order(&self, order: &VoucherOrder) -> Result<(), PersistenceError> {
        let _tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        self.insert(order)
    }

    async fn count_orders(&self, user_id: u64, voucher_id: u64) -> Result<u64, PersistenceError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.voucher_id == voucher_id)
            .count() as u64)
    }

    async fn create_order(&self, order: &VoucherOrder) -> Result<(), PersistenceError> {
        let _tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if self.orders.contains_key(&order.id) {
            return Err(PersistenceError::DuplicateOrder { order_id: order.id });
        }
        if !self.decrement(order.voucher_id)? {
            return Err(PersistenceError::StockExhausted {
                voucher_id: order.voucher_id,
            });
        }
        self.insert(order)
    }
}
