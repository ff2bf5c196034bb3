use chrono::Utc;
use rust_decimal::Decimal;

use crate::commands::{CancelOrderCommand, PlaceOrderCommand};
use crate::error::{EngineError, RejectReason};
use crate::events::{Acknowledgement, OrderAccepted, OrderCancelled};
use crate::orderbook::OrderBook;
use crate::registry::{OrderLocation, OrderRegistry};
use crate::types::{DepthSnapshot, Order, OrderSide, OrderStatus, OrderType, Trade};

/// Result of an accepted submission: the acknowledgement plus every trade it
/// produced, in execution order.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub ack: Acknowledgement,
    pub trades: Vec<Trade>,
}

/// Single-symbol matching core. Owns the symbol's book and registry; pure
/// in-memory, no I/O. Mutated by exactly one execution context at a time,
/// which makes price-time priority a direct consequence of call order.
pub struct SymbolEngine {
    symbol: String,
    book: OrderBook,
    registry: OrderRegistry,
    next_order_sequence: u64,
    next_trade_sequence: u64,
}

impl SymbolEngine {
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            book: OrderBook::new(symbol.clone()),
            symbol,
            registry: OrderRegistry::new(),
            next_order_sequence: 1,
            next_trade_sequence: 1,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Process one submission to completion: validate, match, apply the
    /// order-type residual policy, and check the no-cross invariant.
    ///
    /// Validation and fill-or-kill liquidity failures come back as `Err`
    /// before any book mutation; the caller turns them into rejection
    /// acknowledgements. `Invariant` errors are fatal.
    pub fn submit(&mut self, cmd: PlaceOrderCommand) -> Result<SubmitOutcome, EngineError> {
        Self::validate(&cmd).map_err(EngineError::Validation)?;
        // A still-resting id must stay cancellable; reuse would orphan it.
        if self.registry.contains(&cmd.order_id) {
            return Err(EngineError::Validation(RejectReason::DuplicateOrderId));
        }

        let sequence = self.next_order_sequence;
        self.next_order_sequence += 1;

        let mut order = Order {
            id: cmd.order_id,
            symbol: cmd.symbol,
            order_type: cmd.order_type,
            side: cmd.side,
            // Any price supplied on a market order is ignored.
            price: match cmd.order_type {
                OrderType::Market => None,
                _ => cmd.price,
            },
            quantity: cmd.quantity,
            remaining: cmd.quantity,
            sequence,
            status: OrderStatus::Pending,
            created_at: cmd.timestamp,
            updated_at: cmd.timestamp,
        };

        // All-or-nothing admissibility: walk the opposing side read-only
        // before touching anything. Inadmissible means zero trades and an
        // untouched book.
        if order.order_type == OrderType::FillOrKill {
            let reachable = self.book.available_within_limit(
                order.side.opposite(),
                order.price,
                order.quantity,
            );
            if !reachable {
                return Err(EngineError::Liquidity(order.id));
            }
        }

        let trades = self.run_matching(&mut order);

        if order.remaining.is_zero() {
            order.status = OrderStatus::Filled;
        } else {
            match order.order_type {
                OrderType::Limit => {
                    order.status = if trades.is_empty() {
                        OrderStatus::Resting
                    } else {
                        OrderStatus::PartiallyFilled
                    };
                    let price = order
                        .price
                        .ok_or_else(|| EngineError::Invariant("resting order without a price".to_string()))?;
                    self.registry.insert(order.id, OrderLocation { side: order.side, price });
                    self.book.insert_resting(price, order.clone());
                }
                // Market and IOC residuals are discarded, never rest.
                OrderType::Market | OrderType::ImmediateOrCancel => {
                    order.status = OrderStatus::Cancelled;
                }
                OrderType::FillOrKill => {
                    return Err(EngineError::Invariant(
                        "fill-or-kill order not fully consumed after admissibility check".to_string(),
                    ));
                }
            }
        }

        if self.book.is_crossed() {
            return Err(EngineError::Invariant(format!(
                "book for {} crossed after submission",
                self.symbol
            )));
        }

        Ok(SubmitOutcome {
            ack: Acknowledgement::Accepted(OrderAccepted {
                order_id: order.id,
                symbol: self.symbol.clone(),
                sequence,
                status: order.status,
                timestamp: Utc::now(),
            }),
            trades,
        })
    }

    fn validate(cmd: &PlaceOrderCommand) -> Result<(), RejectReason> {
        if cmd.quantity <= Decimal::ZERO {
            return Err(RejectReason::InvalidQuantity);
        }
        match cmd.order_type {
            OrderType::Market => Ok(()),
            OrderType::Limit | OrderType::ImmediateOrCancel | OrderType::FillOrKill => {
                match cmd.price {
                    None => Err(RejectReason::MissingPrice),
                    Some(price) if price <= Decimal::ZERO => Err(RejectReason::InvalidPrice),
                    Some(_) => Ok(()),
                }
            }
        }
    }

    fn is_marketable(order: &Order, best_opposing: Decimal) -> bool {
        match order.order_type {
            OrderType::Market => true,
            _ => match (order.side, order.price) {
                (OrderSide::Buy, Some(price)) => price >= best_opposing,
                (OrderSide::Sell, Some(price)) => price <= best_opposing,
                (_, None) => false,
            },
        }
    }

    /// Core loop: while marketable against the best opposing level, fill
    /// against its earliest order at the resting price.
    fn run_matching(&mut self, order: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();
        let opposing = order.side.opposite();

        while order.remaining > Decimal::ZERO {
            let Some(best) = self.book.best_price(opposing) else {
                break;
            };
            if !Self::is_marketable(order, best) {
                break;
            }
            let Some(fill) = self.book.execute_at_best(opposing, order.remaining) else {
                break;
            };

            order.remaining -= fill.quantity;
            order.updated_at = Utc::now();
            if fill.maker_remaining.is_zero() {
                self.registry.remove(&fill.order_id);
            }

            let sequence = self.next_trade_sequence;
            self.next_trade_sequence += 1;
            let (buy_order_id, sell_order_id) = match order.side {
                OrderSide::Buy => (order.id, fill.order_id),
                OrderSide::Sell => (fill.order_id, order.id),
            };
            trades.push(Trade {
                symbol: self.symbol.clone(),
                buy_order_id,
                sell_order_id,
                price: fill.price,
                quantity: fill.quantity,
                aggressor: order.side,
                sequence,
                executed_at: Utc::now(),
            });
        }

        trades
    }

    /// Cancel a resting order. Unknown and terminal ids are the same case:
    /// the registry never holds terminal orders.
    pub fn cancel(&mut self, cmd: CancelOrderCommand) -> Result<Acknowledgement, EngineError> {
        let location = self
            .registry
            .remove(&cmd.order_id)
            .ok_or(EngineError::NotFound(cmd.order_id))?;

        let mut order = self
            .book
            .remove_order(location.side, location.price, cmd.order_id)
            .ok_or_else(|| {
                EngineError::Invariant(format!(
                    "registry entry for {} had no matching book entry",
                    cmd.order_id
                ))
            })?;
        order.status = OrderStatus::Cancelled;

        Ok(Acknowledgement::Cancelled(OrderCancelled {
            order_id: order.id,
            symbol: self.symbol.clone(),
            remaining_quantity: order.remaining,
            timestamp: Utc::now(),
        }))
    }

    /// Bounded best-to-worst depth snapshot, both sides. Read-only.
    pub fn depth(&self, max_levels: Option<usize>) -> DepthSnapshot {
        let max_levels = max_levels.unwrap_or(usize::MAX);
        DepthSnapshot {
            symbol: self.symbol.clone(),
            bids: self.book.depth(OrderSide::Buy, max_levels).collect(),
            asks: self.book.depth(OrderSide::Sell, max_levels).collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn resting_count(&self) -> usize {
        self.registry.len()
    }
}
