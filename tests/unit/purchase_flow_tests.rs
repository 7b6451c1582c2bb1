/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

use chrono::{Duration, Utc};
use seckill_rs::fulfillment::{FulfillmentEvent, ReconciliationLog};
use seckill_rs::prelude::*;
use seckill_rs::FulfillmentHandle;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod tests {
    use super::*;

    struct Sale {
        service: Arc<SeckillService>,
        repository: Arc<InMemoryRepository>,
        handle: FulfillmentHandle,
        events: Arc<Mutex<Vec<FulfillmentEvent>>>,
        reconciliation: Arc<dyn ReconciliationLog>,
    }

    async fn open_sale(voucher_id: u64, stock: i64) -> Sale {
        let config = SeckillConfig::default();
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let repository = Arc::new(InMemoryRepository::new());
        repository.add_voucher(voucher_id, stock);

        let mut pipeline = FulfillmentPipeline::new(
            repository.clone(),
            DistributedLock::new(store.clone()),
            config.fulfillment.clone(),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        pipeline.add_listener(move |event| {
            events_clone.lock().unwrap().push(event.clone());
        });
        let reconciliation = pipeline.reconciliation_log();

        let service = Arc::new(SeckillService::new(store, pipeline.sender(), &config));
        let handle = pipeline.spawn();

        let now = Utc::now();
        let voucher = SeckillVoucher::new(
            voucher_id,
            stock,
            now - Duration::minutes(1),
            now + Duration::hours(1),
        );
        service.publish_voucher(&voucher).await.unwrap();

        Sale {
            service,
            repository,
            handle,
            events,
            reconciliation,
        }
    }

    async fn race(
        service: &Arc<SeckillService>,
        voucher_id: u64,
        users: Vec<u64>,
    ) -> Vec<Result<u64, SeckillError>> {
        let mut handles = Vec::new();
        for user_id in users {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.purchase(voucher_id, user_id).await
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_unit_goes_to_exactly_one_buyer() {
        let sale = open_sale(1, 1).await;

        let results = race(&sale.service, 1, vec![100, 200]).await;
        let granted = results.iter().filter(|r| r.is_ok()).count();
        let sold_out = results
            .iter()
            .filter(|r| matches!(r, Err(SeckillError::OutOfStock { voucher_id: 1 })))
            .count();
        assert_eq!(granted, 1);
        assert_eq!(sold_out, 1);

        drop(sale.service);
        assert_eq!(sale.handle.wait().await.unwrap(), 1);
        assert_eq!(sale.repository.order_count(), 1);
        assert_eq!(sale.repository.get_voucher_stock(1).await, Ok(Some(0)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_buyer_twice_gets_one_order() {
        let sale = open_sale(2, 5).await;

        let results = race(&sale.service, 2, vec![42, 42]).await;
        let granted = results.iter().filter(|r| r.is_ok()).count();
        let duplicate = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(SeckillError::DuplicateOrder {
                        voucher_id: 2,
                        user_id: 42
                    })
                )
            })
            .count();
        assert_eq!(granted, 1);
        assert_eq!(duplicate, 1);
        assert_eq!(sale.service.admission().remaining_stock(2).await, Ok(Some(4)));

        drop(sale.service);
        sale.handle.wait().await.unwrap();
        assert_eq!(sale.repository.count_orders(42, 2).await, Ok(1));
        assert_eq!(sale.repository.get_voucher_stock(2).await, Ok(Some(4)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_crowded_sale_never_oversells() {
        let stock = 50;
        let sale = open_sale(3, stock).await;

        let users: Vec<u64> = (0..600u64).map(|n| n % 400).collect();
        let results = race(&sale.service, 3, users).await;

        let order_ids: Vec<u64> = results.iter().filter_map(|r| r.clone().ok()).collect();
        assert_eq!(order_ids.len(), stock as usize);
        let unique: HashSet<u64> = order_ids.iter().copied().collect();
        assert_eq!(unique.len(), order_ids.len());
        assert!(results.iter().all(|r| matches!(
            r,
            Ok(_) | Err(SeckillError::OutOfStock { .. }) | Err(SeckillError::DuplicateOrder { .. })
        )));
        assert_eq!(sale.service.admission().remaining_stock(3).await, Ok(Some(0)));

        drop(sale.service);
        assert_eq!(sale.handle.wait().await.unwrap(), stock as u64);

        let rows = sale.repository.orders();
        assert_eq!(rows.len(), stock as usize);
        let buyers: HashSet<u64> = rows.iter().map(|o| o.user_id).collect();
        assert_eq!(buyers.len(), rows.len());
        assert_eq!(sale.repository.get_voucher_stock(3).await, Ok(Some(0)));
        assert!(sale.reconciliation.is_empty());

        let events = sale.events.lock().unwrap();
        assert_eq!(events.len(), stock as usize);
        assert!(events.iter().all(|e| e.outcome.is_persisted()));
        assert!(events.windows(2).all(|w| w[0].sequence_num + 1 == w[1].sequence_num));
    }
}
