/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Tests for full and closed queues.

#[cfg(test)]
mod tests {
    use crate::fulfillment::{
        EnqueueError, FulfillmentConfig, FulfillmentPipeline, OverflowPolicy, VoucherOrder,
    };
    use crate::lock::DistributedLock;
    use crate::repository::InMemoryRepository;
    use crate::store::{InMemoryStore, SharedStore};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn build(
        overflow: OverflowPolicy,
        capacity: usize,
    ) -> (FulfillmentPipeline, Arc<InMemoryRepository>) {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let repository = Arc::new(InMemoryRepository::new());
        repository.add_voucher(1, 100);
        let config = FulfillmentConfig {
            overflow,
            ..FulfillmentConfig::default()
        };
        let pipeline = FulfillmentPipeline::with_capacity(
            repository.clone(),
            DistributedLock::new(store),
            config,
            capacity,
        );
        (pipeline, repository)
    }

    #[tokio::test]
    async fn test_reject_policy_fails_fast_and_returns_order() {
        let (pipeline, _) = build(OverflowPolicy::Reject, 1);
        let sender = pipeline.sender();

        sender.enqueue(VoucherOrder::new(1, 10, 1)).await.unwrap();
        assert_eq!(sender.available_capacity(), 0);

        let rejected = VoucherOrder::new(2, 11, 1);
        let error = sender.enqueue(rejected.clone()).await.unwrap_err();
        assert!(matches!(error, EnqueueError::Full(_)));
        assert_eq!(error.into_order(), rejected);
    }

    #[tokio::test]
    async fn test_block_policy_times_out() {
        let timeout = Duration::from_millis(30);
        let (pipeline, _) = build(OverflowPolicy::Block { timeout }, 1);
        let sender = pipeline.sender();

        sender.enqueue(VoucherOrder::new(1, 10, 1)).await.unwrap();
        let started = Instant::now();
        let result = sender.enqueue(VoucherOrder::new(2, 11, 1)).await;
        assert!(matches!(result, Err(EnqueueError::Full(ref order)) if order.id == 2));
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_block_policy_waits_for_worker() {
        let (pipeline, repository) = build(
            OverflowPolicy::Block {
                timeout: Duration::from_secs(5),
            },
            1,
        );
        let sender = pipeline.sender();
        let handle = pipeline.spawn();

        for i in 0..10u64 {
            sender.enqueue(VoucherOrder::new(i, i, 1)).await.unwrap();
        }
        drop(sender);
        assert_eq!(handle.wait().await.unwrap(), 10);
        assert_eq!(repository.order_count(), 10);
    }

    #[tokio::test]
    async fn test_closed_pipeline_rejects() {
        let (pipeline, _) = build(OverflowPolicy::default(), 8);
        let sender = pipeline.sender();
        drop(pipeline);

        assert!(sender.is_closed());
        let result = sender.enqueue(VoucherOrder::new(5, 50, 1)).await;
        assert!(matches!(result, Err(EnqueueError::Closed(_))));

        let (pipeline, _) = build(OverflowPolicy::Reject, 8);
        let sender = pipeline.sender();
        drop(pipeline);
        let result = sender.enqueue(VoucherOrder::new(6, 60, 1)).await;
        assert!(matches!(result, Err(EnqueueError::Closed(_))));
    }
}
