use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::commands::{CancelOrderCommand, OrderCommand, PlaceOrderCommand};
use crate::engine::{SubmitOutcome, SymbolEngine};
use crate::error::{CancelRejectReason, EngineError, RejectReason};
use crate::events::{Acknowledgement, CancelRejected, OrderRejected};
use crate::publisher::{EventPublisher, OrderSource};
use crate::types::DepthSnapshot;

const WORKER_QUEUE_DEPTH: usize = 1024;

enum SymbolRequest {
    Place(
        PlaceOrderCommand,
        oneshot::Sender<Result<SubmitOutcome, EngineError>>,
    ),
    Cancel(
        CancelOrderCommand,
        oneshot::Sender<Result<Acknowledgement, EngineError>>,
    ),
    Depth(Option<usize>, oneshot::Sender<DepthSnapshot>),
}

/// Multi-symbol matching engine. Each symbol gets a dedicated worker task
/// owning that symbol's book and registry, so all mutations to a book are
/// serialized in arrival order while symbols run fully in parallel.
pub struct MatchingEngine {
    symbols: DashMap<String, mpsc::Sender<SymbolRequest>>,
    publisher: Arc<dyn EventPublisher>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl MatchingEngine {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            symbols: DashMap::new(),
            publisher,
            workers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    async fn sender_for(&self, symbol: &str) -> Result<mpsc::Sender<SymbolRequest>, EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Shutdown);
        }
        if let Some(sender) = self.symbols.get(symbol) {
            return Ok(sender.clone());
        }
        let sender = match self.symbols.entry(symbol.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (sender, receiver) = mpsc::channel(WORKER_QUEUE_DEPTH);
                entry.insert(sender.clone());
                let handle = tokio::spawn(symbol_worker(
                    symbol.to_string(),
                    receiver,
                    self.publisher.clone(),
                ));
                self.workers.lock().push(handle);
                sender
            }
        };
        Ok(sender)
    }

    /// Submit an order. Synchronous from the caller's perspective: the
    /// returned acknowledgement and trades are committed book state before
    /// the next order for the same symbol begins processing.
    pub async fn submit(&self, cmd: PlaceOrderCommand) -> Result<SubmitOutcome, EngineError> {
        let sender = self.sender_for(&cmd.symbol).await?;
        let (reply, response) = oneshot::channel();
        sender
            .send(SymbolRequest::Place(cmd, reply))
            .await
            .map_err(|_| EngineError::Shutdown)?;
        response.await.map_err(|_| EngineError::Shutdown)?
    }

    /// Cancel a resting order. Serialized through the symbol's worker, so a
    /// cancel racing an in-flight match resolves by arrival order.
    pub async fn cancel(&self, cmd: CancelOrderCommand) -> Result<Acknowledgement, EngineError> {
        let sender = self.sender_for(&cmd.symbol).await?;
        let (reply, response) = oneshot::channel();
        sender
            .send(SymbolRequest::Cancel(cmd, reply))
            .await
            .map_err(|_| EngineError::Shutdown)?;
        response.await.map_err(|_| EngineError::Shutdown)?
    }

    /// Read-only depth snapshot. An unknown symbol yields an empty snapshot
    /// without spawning a worker.
    pub async fn depth(
        &self,
        symbol: &str,
        max_levels: Option<usize>,
    ) -> Result<DepthSnapshot, EngineError> {
        let Some(sender) = self.symbols.get(symbol).map(|s| s.clone()) else {
            return Ok(DepthSnapshot::empty(symbol.to_string()));
        };
        let (reply, response) = oneshot::channel();
        sender
            .send(SymbolRequest::Depth(max_levels, reply))
            .await
            .map_err(|_| EngineError::Shutdown)?;
        response.await.map_err(|_| EngineError::Shutdown)
    }

    /// Pull commands from a source until end-of-stream, routing each to its
    /// symbol's worker.
    pub async fn run(&self, mut source: impl OrderSource) -> Result<(), EngineError> {
        while let Some(command) = source.next().await {
            match command {
                OrderCommand::PlaceOrder(cmd) => {
                    self.submit(cmd).await?;
                }
                OrderCommand::CancelOrder(cmd) => {
                    self.cancel(cmd).await?;
                }
            }
        }
        Ok(())
    }

    /// Close intake and wait for every worker to drain its queue. No order
    /// already accepted is left half-processed.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.symbols.clear();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if let Err(join_error) = handle.await {
                error!("symbol worker panicked: {join_error}");
            }
        }
    }
}

async fn symbol_worker(
    symbol: String,
    mut requests: mpsc::Receiver<SymbolRequest>,
    publisher: Arc<dyn EventPublisher>,
) {
    debug!(%symbol, "symbol worker started");
    let mut engine = SymbolEngine::new(symbol.clone());

    while let Some(request) = requests.recv().await {
        match request {
            SymbolRequest::Place(cmd, reply) => {
                let order_id = cmd.order_id;
                let result = match engine.submit(cmd) {
                    Ok(outcome) => Ok(outcome),
                    Err(EngineError::Validation(reason)) => Ok(rejection(&symbol, order_id, reason)),
                    Err(EngineError::Liquidity(_)) => Ok(rejection(
                        &symbol,
                        order_id,
                        RejectReason::InsufficientLiquidity,
                    )),
                    Err(fatal) => {
                        error!(%symbol, %order_id, "submission failed: {fatal}");
                        Err(fatal)
                    }
                };
                if let Ok(outcome) = &result {
                    publish_outcome(publisher.as_ref(), outcome).await;
                }
                let _ = reply.send(result);
            }
            SymbolRequest::Cancel(cmd, reply) => {
                let order_id = cmd.order_id;
                let result = match engine.cancel(cmd) {
                    Ok(ack) => Ok(ack),
                    Err(EngineError::NotFound(_)) => {
                        Ok(Acknowledgement::CancelRejected(CancelRejected {
                            order_id,
                            symbol: symbol.clone(),
                            reason: CancelRejectReason::NotFound,
                            timestamp: Utc::now(),
                        }))
                    }
                    Err(fatal) => {
                        error!(%symbol, %order_id, "cancellation failed: {fatal}");
                        Err(fatal)
                    }
                };
                if let Ok(ack) = &result {
                    if let Err(delivery) = publisher.publish_ack(ack.clone()).await {
                        warn!(%symbol, "acknowledgement delivery failed: {delivery}");
                    }
                }
                let _ = reply.send(result);
            }
            SymbolRequest::Depth(max_levels, reply) => {
                let _ = reply.send(engine.depth(max_levels));
            }
        }
    }
    debug!(%symbol, "symbol worker drained and stopped");
}

fn rejection(symbol: &str, order_id: uuid::Uuid, reason: RejectReason) -> SubmitOutcome {
    SubmitOutcome {
        ack: Acknowledgement::Rejected(OrderRejected {
            order_id,
            symbol: symbol.to_string(),
            reason,
            timestamp: Utc::now(),
        }),
        trades: Vec::new(),
    }
}

async fn publish_outcome(publisher: &dyn EventPublisher, outcome: &SubmitOutcome) {
    if let Err(delivery) = publisher.publish_ack(outcome.ack.clone()).await {
        warn!("acknowledgement delivery failed: {delivery}");
    }
    for trade in &outcome.trades {
        if let Err(delivery) = publisher.publish_trade(trade.clone()).await {
            warn!("trade delivery failed: {delivery}");
        }
    }
}
