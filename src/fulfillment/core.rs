/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Core fulfillment pipeline implementation.
//!
//! A bounded channel feeds one worker task. The worker owns the repository
//! handle, the per-user lock and the listeners, so nothing on the write path
//! is shared with admission.

use super::event::FulfillmentEvent;
use super::order::VoucherOrder;
use super::outcome::{FulfillmentError, FulfillmentOutcome};
use super::reconciliation::{InMemoryReconciliationLog, ReconciliationEntry, ReconciliationLog};
use crate::lock::DistributedLock;
use crate::repository::OrderRepository;
use crate::retry::RetryPolicy;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024 * 1024;

/// Type alias for event listener functions.
type EventListener = Arc<dyn Fn(&FulfillmentEvent) + Send + Sync>;

/// What [`OrderSender::enqueue`] does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Wait up to `timeout` for a free slot, then fail.
    Block {
        /// Longest wait for capacity.
        timeout: Duration,
    },
    /// Fail immediately.
    Reject,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Block {
            timeout: Duration::from_millis(100),
        }
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Lease of the per-user lock taken around each write.
    pub user_lock_lease: Duration,
    /// Acquisition schedule for the per-user lock.
    pub lock_retry: RetryPolicy,
    /// Retry schedule for transient persistence failures.
    pub persistence_retry: RetryPolicy,
    /// Full-queue behavior.
    pub overflow: OverflowPolicy,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            user_lock_lease: Duration::from_secs(10),
            lock_retry: RetryPolicy::fixed(20, Duration::from_millis(50)),
            persistence_retry: RetryPolicy::default(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Rejected enqueue. The order is handed back so the caller can compensate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// No free slot within the overflow policy.
    #[error("fulfillment queue full, order {} not accepted", .0.id)]
    Full(VoucherOrder),

    /// The worker has stopped.
    #[error("fulfillment pipeline closed, order {} not accepted", .0.id)]
    Closed(VoucherOrder),
}

impl EnqueueError {
    /// Returns the order that was not enqueued.
    #[must_use]
    pub fn into_order(self) -> VoucherOrder {
        match self {
            Self::Full(order) | Self::Closed(order) => order,
        }
    }
}

/// Producer side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OrderSender {
    tx: mpsc::Sender<VoucherOrder>,
    overflow: OverflowPolicy,
}

impl OrderSender {
    /// Hands `order` to the worker following the overflow policy.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::Full`] when no slot frees up in time and
    /// [`EnqueueError::Closed`] when the worker is gone.
    pub async fn enqueue(&self, order: VoucherOrder) -> Result<(), EnqueueError> {
        match self.overflow {
            OverflowPolicy::Reject => self.tx.try_send(order).map_err(|error| match error {
                TrySendError::Full(order) => EnqueueError::Full(order),
                TrySendError::Closed(order) => EnqueueError::Closed(order),
            }),
            OverflowPolicy::Block { timeout } => {
                match tokio::time::timeout(timeout, self.tx.reserve()).await {
                    Ok(Ok(permit)) => {
                        permit.send(order);
                        Ok(())
                    }
                    Ok(Err(_)) => Err(EnqueueError::Closed(order)),
                    Err(_) => Err(EnqueueError::Full(order)),
                }
            }
        }
    }

    /// Free slots right now.
    #[must_use]
    pub fn available_capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Returns `true` once the worker has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-consumer pipeline persisting reserved orders.
///
/// # Examples
///
/// ```no_run
/// use seckill_rs::fulfillment::{FulfillmentConfig, FulfillmentPipeline, VoucherOrder};
/// use seckill_rs::lock::DistributedLock;
/// use seckill_rs::repository::InMemoryRepository;
/// use seckill_rs::store::{InMemoryStore, SharedStore};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: SharedStore = Arc::new(InMemoryStore::new());
/// let repository = Arc::new(InMemoryRepository::new());
/// repository.add_voucher(7, 10);
///
/// let pipeline = FulfillmentPipeline::new(
///     repository.clone(),
///     DistributedLock::new(store),
///     FulfillmentConfig::default(),
/// );
/// let sender = pipeline.sender();
/// let handle = pipeline.spawn();
///
/// sender.enqueue(VoucherOrder::new(1, 1001, 7)).await?;
/// drop(sender);
/// assert_eq!(handle.wait().await?, 1);
/// # Ok(())
/// # }
/// ```
pub struct FulfillmentPipeline {
    sender: OrderSender,
    receiver: mpsc::Receiver<VoucherOrder>,
    worker: Worker,
}

impl FulfillmentPipeline {
    /// Creates a pipeline with `config.queue_capacity` slots.
    #[must_use]
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        locks: DistributedLock,
        config: FulfillmentConfig,
    ) -> Self {
        let capacity = config.queue_capacity;
        Self::with_capacity(repository, locks, config, capacity)
    }

    /// Creates a pipeline with a specific queue capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(
        repository: Arc<dyn OrderRepository>,
        locks: DistributedLock,
        mut config: FulfillmentConfig,
        capacity: usize,
    ) -> Self {
        config.queue_capacity = capacity.max(1);
        let (tx, receiver) = mpsc::channel(config.queue_capacity);

        Self {
            sender: OrderSender {
                tx,
                overflow: config.overflow,
            },
            receiver,
            worker: Worker {
                repository,
                locks,
                config,
                sequence: 1,
                listeners: Vec::new(),
                reconciliation: Arc::new(InMemoryReconciliationLog::new()),
            },
        }
    }

    /// Replaces the default in-memory reconciliation log.
    #[must_use]
    pub fn with_reconciliation_log(mut self, log: Arc<dyn ReconciliationLog>) -> Self {
        self.worker.reconciliation = log;
        self
    }

    /// The log abandoned orders are appended to.
    #[must_use]
    pub fn reconciliation_log(&self) -> Arc<dyn ReconciliationLog> {
        self.worker.reconciliation.clone()
    }

    /// Registers an event listener.
    ///
    /// Listeners are called synchronously on the worker, in processing
    /// order, once per order.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: Fn(&FulfillmentEvent) + Send + Sync + 'static,
    {
        self.worker.listeners.push(Arc::new(listener));
    }

    /// Returns a producer handle.
    ///
    /// The worker stops once every handle is dropped and the queue is
    /// drained.
    #[must_use]
    pub fn sender(&self) -> OrderSender {
        self.sender.clone()
    }

    /// Spawns the worker on a new task.
    #[must_use]
    pub fn spawn(self) -> FulfillmentHandle {
        let Self {
            sender,
            receiver,
            worker,
        } = self;
        drop(sender);

        let handle = tokio::spawn(worker.run(receiver));
        FulfillmentHandle { handle }
    }
}

/// Handle to a spawned fulfillment worker.
pub struct FulfillmentHandle {
    handle: tokio::task::JoinHandle<u64>,
}

impl FulfillmentHandle {
    /// Waits for the worker to drain the queue and stop.
    ///
    /// Returns the number of orders processed.
    pub async fn wait(self) -> Result<u64, tokio::task::JoinError> {
        self.handle.await
    }

    /// Returns `true` once the worker has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

struct Worker {
    repository: Arc<dyn OrderRepository>,
    locks: DistributedLock,
    config: FulfillmentConfig,
    sequence: u64,
    listeners: Vec<EventListener>,
    reconciliation: Arc<dyn ReconciliationLog>,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<VoucherOrder>) -> u64 {
        info!(capacity = self.config.queue_capacity, "fulfillment worker started");

        while let Some(order) = receiver.recv().await {
            let seq = self.sequence;
            self.sequence += 1;

            let outcome = self.fulfill(&order).await;
            let event = FulfillmentEvent::new(seq, nanos_since_epoch(), order, outcome);

            for listener in &self.listeners {
                listener(&event);
            }
        }

        let processed = self.sequence - 1;
        info!(processed, "fulfillment queue closed, worker stopped");
        processed
    }

    async fn fulfill(&self, order: &VoucherOrder) -> FulfillmentOutcome {
        let policy = &self.config.persistence_retry;
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);
            let error = match self.attempt(order, attempt).await {
                Ok(outcome) => return outcome,
                Err(error) => error,
            };

            if error.is_retryable() && policy.allows_retry(attempt) {
                let delay = policy.backoff_delay(attempt - 1);
                warn!(
                    order_id = order.id,
                    user_id = order.user_id,
                    attempt,
                    ?delay,
                    %error,
                    "order persistence failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            self.reconcile(order, &error, attempt);
            return FulfillmentOutcome::Abandoned {
                error,
                attempts: attempt,
            };
        }
    }

    async fn attempt(
        &self,
        order: &VoucherOrder,
        attempt: u32,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let resource = format!("order:{}", order.user_id);
        let token = self
            .locks
            .lock_with_retry(&resource, self.config.user_lock_lease, &self.config.lock_retry)
            .await?
            .ok_or(FulfillmentError::LockBusy {
                user_id: order.user_id,
                attempts: self.config.lock_retry.max_attempts,
            })?;

        let result = self.persist(order, attempt).await;

        if let Err(error) = self.locks.unlock(&resource, &token).await {
            warn!(user_id = order.user_id, %error, "failed to release per-user lease");
        }
        result
    }

    async fn persist(
        &self,
        order: &VoucherOrder,
        attempt: u32,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let existing = self
            .repository
            .count_orders(order.user_id, order.voucher_id)
            .await?;
        if existing > 0 {
            warn!(
                order_id = order.id,
                user_id = order.user_id,
                voucher_id = order.voucher_id,
                existing,
                "buyer already has an order for this voucher, skipping"
            );
            return Ok(FulfillmentOutcome::SkippedDuplicate);
        }

        self.repository.create_order(order).await?;
        debug!(
            order_id = order.id,
            user_id = order.user_id,
            voucher_id = order.voucher_id,
            attempt,
            "order persisted"
        );
        Ok(FulfillmentOutcome::Persisted { attempts: attempt })
    }

    fn reconcile(&self, order: &VoucherOrder, error: &FulfillmentError, attempts: u32) {
        error!(
            target: "reconciliation",
            order_id = order.id,
            user_id = order.user_id,
            voucher_id = order.voucher_id,
            attempts,
            %error,
            "reserved order could not be persisted"
        );
        self.reconciliation.record(ReconciliationEntry {
            order: order.clone(),
            reason: error.to_string(),
            attempts,
            recorded_at: Utc::now(),
        });
    }
}

/// Returns the current time in nanoseconds since the Unix epoch.
#[inline]
fn nanos_since_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
