pub mod engine;
pub mod error;
pub mod publisher;
pub mod service;
pub mod types;
mod commands;
mod events;
mod orderbook;
mod registry;

pub use types::{
    DepthLevel, DepthSnapshot, Order, OrderSide, OrderStatus, OrderType, Trade,
};
pub use commands::{CancelOrderCommand, OrderCommand, PlaceOrderCommand};
pub use engine::{SubmitOutcome, SymbolEngine};
pub use error::{CancelRejectReason, EngineError, PublishError, RejectReason};
pub use events::{
    Acknowledgement, CancelRejected, OrderAccepted, OrderCancelled, OrderRejected,
};
pub use orderbook::OrderBook;
pub use publisher::{ChannelOrderSource, EventPublisher, InMemoryPublisher, OrderSource};
pub use registry::{OrderLocation, OrderRegistry};
pub use service::MatchingEngine;
