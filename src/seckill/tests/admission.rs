/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Concurrency properties of the admission script.

#[cfg(test)]
mod tests {
    use crate::seckill::{Admission, AdmissionScript, SeckillVoucher};
    use crate::store::{InMemoryStore, SharedStore, StoreError};
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn voucher(voucher_id: u64, stock: i64) -> SeckillVoucher {
        let now = Utc::now();
        SeckillVoucher::new(voucher_id, stock, now - Duration::minutes(1), now + Duration::hours(1))
    }

    async fn published(stock: i64) -> AdmissionScript {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let admission = AdmissionScript::new(store);
        admission.publish(&voucher(1, stock)).await.unwrap();
        admission
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_stock_never_goes_negative() {
        let admission = published(30).await;

        let mut handles = Vec::new();
        for user_id in 0..500u64 {
            let admission = admission.clone();
            handles.push(tokio::spawn(async move {
                admission.admit(1, user_id).await.unwrap()
            }));
        }

        let mut tally: HashMap<Admission, usize> = HashMap::new();
        for handle in handles {
            *tally.entry(handle.await.unwrap()).or_default() += 1;
        }

        assert_eq!(tally.get(&Admission::Granted), Some(&30));
        assert_eq!(tally.get(&Admission::OutOfStock), Some(&470));
        assert_eq!(tally.get(&Admission::DuplicateOrder), None);
        assert_eq!(admission.remaining_stock(1).await, Ok(Some(0)));
        assert_eq!(admission.buyer_count(1).await, Ok(30));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_one_grant_per_user() {
        let admission = published(1000).await;

        let mut handles = Vec::new();
        for attempt in 0..400u64 {
            let admission = admission.clone();
            let user_id = attempt % 10;
            handles.push(tokio::spawn(async move {
                (user_id, admission.admit(1, user_id).await.unwrap())
            }));
        }

        let mut grants: HashMap<u64, usize> = HashMap::new();
        for handle in handles {
            let (user_id, admission) = handle.await.unwrap();
            if admission == Admission::Granted {
                *grants.entry(user_id).or_default() += 1;
            } else {
                assert_eq!(admission, Admission::DuplicateOrder);
            }
        }

        assert_eq!(grants.len(), 10);
        assert!(grants.values().all(|count| *count == 1));
        assert_eq!(admission.remaining_stock(1).await, Ok(Some(990)));
    }

    #[tokio::test]
    async fn test_revert_returns_unit_and_allows_rebuy() {
        let admission = published(1).await;

        assert_eq!(admission.admit(1, 7).await, Ok(Admission::Granted));
        assert_eq!(admission.admit(1, 8).await, Ok(Admission::OutOfStock));
        assert_eq!(admission.revert(1, 7).await, Ok(true));
        assert_eq!(admission.revert(1, 7).await, Ok(false));
        assert_eq!(admission.remaining_stock(1).await, Ok(Some(1)));
        assert_eq!(admission.admit(1, 8).await, Ok(Admission::Granted));
    }

    #[tokio::test]
    async fn test_unpublished_voucher_is_out_of_stock() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let admission = AdmissionScript::new(store);

        assert_eq!(admission.admit(42, 1).await, Ok(Admission::OutOfStock));
        assert_eq!(admission.remaining_stock(42).await, Ok(None));
        assert_eq!(admission.published_voucher(42).await, Ok(None));
    }

    #[tokio::test]
    async fn test_republish_keeps_buyers() {
        let admission = published(2).await;
        assert_eq!(admission.admit(1, 5).await, Ok(Admission::Granted));

        assert_eq!(admission.publish(&voucher(1, 10)).await, Ok(9));
        assert_eq!(admission.admit(1, 5).await, Ok(Admission::DuplicateOrder));
        assert_eq!(admission.remaining_stock(1).await, Ok(Some(9)));
        assert_eq!(
            admission.published_voucher(1).await.unwrap().map(|v| v.stock),
            Some(10)
        );
    }

    #[tokio::test]
    async fn test_republish_mid_sale_never_exceeds_stock() {
        let admission = published(2).await;
        assert_eq!(admission.admit(1, 0).await, Ok(Admission::Granted));
        assert_eq!(admission.admit(1, 1).await, Ok(Admission::Granted));

        assert_eq!(admission.publish(&voucher(1, 2)).await, Ok(0));

        let mut granted = 2;
        for user_id in 2..10u64 {
            if admission.admit(1, user_id).await.unwrap() == Admission::Granted {
                granted += 1;
            }
        }
        assert_eq!(granted, 2);
        assert_eq!(admission.remaining_stock(1).await, Ok(Some(0)));
        assert_eq!(admission.buyer_count(1).await, Ok(2));
    }

    #[tokio::test]
    async fn test_republish_below_sold_units_floors_at_zero() {
        let admission = published(3).await;
        for user_id in 0..3u64 {
            assert_eq!(admission.admit(1, user_id).await, Ok(Admission::Granted));
        }

        assert_eq!(admission.publish(&voucher(1, 1)).await, Ok(0));
        assert_eq!(admission.admit(1, 9).await, Ok(Admission::OutOfStock));
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let memory = Arc::new(InMemoryStore::new());
        let admission = AdmissionScript::new(memory.clone());
        admission.publish(&voucher(1, 5)).await.unwrap();

        memory.set_online(false);
        let result = admission.admit(1, 1).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        memory.set_online(true);
        assert_eq!(admission.remaining_stock(1).await, Ok(Some(5)));
    }
}
