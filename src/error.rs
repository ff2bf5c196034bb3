use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Reason carried on a rejected submission acknowledgement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("quantity must be positive")]
    InvalidQuantity,
    #[error("price is required for this order type")]
    MissingPrice,
    #[error("price must be positive")]
    InvalidPrice,
    #[error("an order with this id is already resting")]
    DuplicateOrderId,
    #[error("insufficient liquidity to fill the order in full")]
    InsufficientLiquidity,
}

/// Reason carried on a rejected cancellation acknowledgement.
///
/// The registry never holds terminal orders, so an unknown id and an
/// already-filled or already-cancelled id are indistinguishable here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CancelRejectReason {
    #[error("order not found or already terminal")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed submission; rejected before any book mutation.
    #[error("validation failed: {0}")]
    Validation(RejectReason),
    /// Fill-or-kill order cannot be fully filled; book untouched.
    #[error("insufficient liquidity to fully fill order {0}")]
    Liquidity(Uuid),
    /// Cancellation of an unknown or already-terminal order.
    #[error("order {0} not found or already terminal")]
    NotFound(Uuid),
    /// Crossed book or book/registry desynchronization. Fatal; never
    /// silently corrected.
    #[error("book invariant violated: {0}")]
    Invariant(String),
    #[error("matching engine is shut down")]
    Shutdown,
}

/// Delivery failure from an [`EventPublisher`](crate::publisher::EventPublisher)
/// implementation. Surfaced to the publish caller only; never affects
/// committed book state.
#[derive(Debug, Clone, Error)]
#[error("event delivery failed: {0}")]
pub struct PublishError(pub String);
