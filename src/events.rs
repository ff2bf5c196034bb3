use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CancelRejectReason, RejectReason};
use crate::types::OrderStatus;

/// Exactly one acknowledgement is produced per submission or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Acknowledgement {
    Accepted(OrderAccepted),
    Rejected(OrderRejected),
    Cancelled(OrderCancelled),
    CancelRejected(CancelRejected),
}

impl Acknowledgement {
    pub fn order_id(&self) -> Uuid {
        match self {
            Acknowledgement::Accepted(e) => e.order_id,
            Acknowledgement::Rejected(e) => e.order_id,
            Acknowledgement::Cancelled(e) => e.order_id,
            Acknowledgement::CancelRejected(e) => e.order_id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Acknowledgement::Accepted(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub order_id: Uuid,
    pub symbol: String,
    /// Arrival sequence assigned at acceptance.
    pub sequence: u64,
    /// Status the order ended processing with.
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejected {
    pub order_id: Uuid,
    pub symbol: String,
    pub reason: RejectReason,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: Uuid,
    pub symbol: String,
    /// Quantity still unfilled when the order left the book.
    pub remaining_quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRejected {
    pub order_id: Uuid,
    pub symbol: String,
    pub reason: CancelRejectReason,
    pub timestamp: DateTime<Utc>,
}
