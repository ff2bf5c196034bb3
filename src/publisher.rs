use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::commands::OrderCommand;
use crate::error::PublishError;
use crate::events::Acknowledgement;
use crate::types::Trade;

/// Downstream sink for acknowledgements and trades. Delivery is best-effort
/// and decoupled from matching: the book is the authoritative record, and a
/// failed publish never rolls back committed state.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_ack(&self, ack: Acknowledgement) -> Result<(), PublishError>;
    async fn publish_trade(&self, trade: Trade) -> Result<(), PublishError>;
}

/// Upstream feed of order commands; `None` marks end-of-stream. Concrete
/// transport (message bus, network socket, test harness) lives behind this.
#[async_trait]
pub trait OrderSource: Send {
    async fn next(&mut self) -> Option<OrderCommand>;
}

/// Publisher that retains everything in memory, keyed the way consumers
/// query it. Used in tests and as the default sink.
#[derive(Default)]
pub struct InMemoryPublisher {
    acks: DashMap<Uuid, Vec<Acknowledgement>>,
    trades: DashMap<String, Vec<Trade>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acks_for(&self, order_id: Uuid) -> Vec<Acknowledgement> {
        self.acks
            .get(&order_id)
            .map(|acks| acks.clone())
            .unwrap_or_default()
    }

    pub fn trades_for(&self, symbol: &str) -> Vec<Trade> {
        self.trades
            .get(symbol)
            .map(|trades| trades.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish_ack(&self, ack: Acknowledgement) -> Result<(), PublishError> {
        self.acks.entry(ack.order_id()).or_default().push(ack);
        Ok(())
    }

    async fn publish_trade(&self, trade: Trade) -> Result<(), PublishError> {
        self.trades
            .entry(trade.symbol.clone())
            .or_default()
            .push(trade);
        Ok(())
    }
}

/// Order source backed by a tokio channel; the returned sender is the
/// intake handle, and dropping it ends the stream.
pub struct ChannelOrderSource {
    receiver: mpsc::Receiver<OrderCommand>,
}

impl ChannelOrderSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<OrderCommand>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl OrderSource for ChannelOrderSource {
    async fn next(&mut self) -> Option<OrderCommand> {
        self.receiver.recv().await
    }
}
