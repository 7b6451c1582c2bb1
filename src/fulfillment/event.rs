/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Fulfillment event types.

use super::order::VoucherOrder;
use super::outcome::FulfillmentOutcome;

/// Event emitted after the worker has processed one order.
///
/// Events are emitted in processing order, which is queue order, so
/// listeners can use them for auditing or live monitoring.
///
/// # Examples
///
/// ```
/// use seckill_rs::fulfillment::{FulfillmentEvent, FulfillmentOutcome, VoucherOrder};
///
/// let event = FulfillmentEvent::new(
///     1,
///     0,
///     VoucherOrder::new(42, 1001, 7),
///     FulfillmentOutcome::Persisted { attempts: 1 },
/// );
/// assert_eq!(event.sequence_num, 1);
/// assert!(event.outcome.is_persisted());
/// ```
#[derive(Debug, Clone)]
pub struct FulfillmentEvent {
    /// Position in processing order, starting at 1.
    pub sequence_num: u64,

    /// Nanosecond timestamp when processing finished.
    pub timestamp_ns: u64,

    /// The processed order.
    pub order: VoucherOrder,

    /// What happened to it.
    pub outcome: FulfillmentOutcome,
}

impl FulfillmentEvent {
    /// Creates a new fulfillment event.
    #[must_use]
    pub fn new(
        sequence_num: u64,
        timestamp_ns: u64,
        order: VoucherOrder,
        outcome: FulfillmentOutcome,
    ) -> Self {
        Self {
            sequence_num,
            timestamp_ns,
            order,
            outcome,
        }
    }
}
