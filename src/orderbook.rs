use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use crate::types::{DepthLevel, Order, OrderSide, OrderStatus};

/// Outcome of filling against the front order of the best opposing level.
#[derive(Debug, Clone)]
pub(crate) struct MakerFill {
    pub order_id: Uuid,
    pub price: Decimal,
    pub quantity: Decimal,
    pub maker_remaining: Decimal,
}

/// All resting orders at one exact price, in FIFO arrival order.
#[derive(Debug, Clone)]
struct PriceLevel {
    price: Decimal,
    orders: VecDeque<Order>,
    total_quantity: Decimal,
}

impl PriceLevel {
    fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: Decimal::ZERO,
        }
    }

    fn push_back(&mut self, order: Order) {
        self.total_quantity += order.remaining;
        self.orders.push_back(order);
    }

    fn remove(&mut self, order_id: Uuid) -> Option<Order> {
        let position = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(position)?;
        self.total_quantity -= order.remaining;
        Some(order)
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// One side of the book: levels keyed by price in a balanced ordered index,
/// with the extreme (best) price cached for O(1) access.
#[derive(Debug)]
struct BookSide {
    side: OrderSide,
    levels: BTreeMap<Decimal, PriceLevel>,
    best: Option<Decimal>,
}

impl BookSide {
    fn new(side: OrderSide) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            best: None,
        }
    }

    fn insert(&mut self, price: Decimal, order: Order) {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(order);

        let improved = match self.best {
            None => true,
            Some(best) => match self.side {
                OrderSide::Buy => price > best,
                OrderSide::Sell => price < best,
            },
        };
        if improved {
            self.best = Some(price);
        }
    }

    /// O(log n); called only when the level holding the cached best empties.
    fn recompute_best(&mut self) {
        self.best = match self.side {
            OrderSide::Buy => self.levels.keys().next_back().copied(),
            OrderSide::Sell => self.levels.keys().next().copied(),
        };
    }

    fn drop_level_if_empty(&mut self, price: Decimal) {
        let emptied = self
            .levels
            .get(&price)
            .map(|level| level.is_empty())
            .unwrap_or(false);
        if emptied {
            self.levels.remove(&price);
            if self.best == Some(price) {
                self.recompute_best();
            }
        }
    }

    /// Lazy best-to-worst walk over levels, bounded by `max_levels`.
    fn depth(&self, max_levels: usize) -> impl Iterator<Item = DepthLevel> + '_ {
        let levels: Box<dyn Iterator<Item = &PriceLevel> + '_> = match self.side {
            OrderSide::Buy => Box::new(self.levels.values().rev()),
            OrderSide::Sell => Box::new(self.levels.values()),
        };
        levels.take(max_levels).map(|level| DepthLevel {
            price: level.price,
            quantity: level.total_quantity,
            order_count: level.orders.len() as u64,
        })
    }
}

/// Per-symbol limit order book: two ordered collections of price levels,
/// each level a FIFO queue of resting orders.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    bids: BookSide,
    asks: BookSide,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BookSide::new(OrderSide::Buy),
            asks: BookSide::new(OrderSide::Sell),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn side(&self, side: OrderSide) -> &BookSide {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: OrderSide) -> &mut BookSide {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }

    /// Append a residual limit order to its price level, creating the level
    /// if absent.
    pub fn insert_resting(&mut self, price: Decimal, order: Order) {
        self.side_mut(order.side).insert(price, order);
    }

    /// Best (extreme) price for a side, O(1) via the cached reference.
    pub fn best_price(&self, side: OrderSide) -> Option<Decimal> {
        self.side(side).best
    }

    /// Fill up to `take` against the earliest order at the best level of
    /// `side`. The maker is popped when fully consumed; the level is dropped
    /// and the cached best recomputed when its queue empties.
    pub(crate) fn execute_at_best(&mut self, side: OrderSide, take: Decimal) -> Option<MakerFill> {
        let book_side = self.side_mut(side);
        let best = book_side.best?;
        let level = book_side.levels.get_mut(&best)?;

        let (order_id, quantity, maker_remaining) = {
            let front = level.orders.front_mut()?;
            let quantity = take.min(front.remaining);
            front.remaining -= quantity;
            front.updated_at = chrono::Utc::now();
            front.status = if front.remaining.is_zero() {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            (front.id, quantity, front.remaining)
        };

        level.total_quantity -= quantity;
        if maker_remaining.is_zero() {
            level.orders.pop_front();
        }
        book_side.drop_level_if_empty(best);

        Some(MakerFill {
            order_id,
            price: best,
            quantity,
            maker_remaining,
        })
    }

    /// Remove one order from its level without disturbing the FIFO order of
    /// the rest. Drops the level when it empties.
    pub fn remove_order(&mut self, side: OrderSide, price: Decimal, order_id: Uuid) -> Option<Order> {
        let book_side = self.side_mut(side);
        let order = book_side.levels.get_mut(&price)?.remove(order_id)?;
        book_side.drop_level_if_empty(price);
        Some(order)
    }

    /// Read-only best-to-worst depth walk, bounded by `max_levels`.
    /// Restartable: calling again yields the same sequence absent mutation.
    pub fn depth(&self, side: OrderSide, max_levels: usize) -> impl Iterator<Item = DepthLevel> + '_ {
        self.side(side).depth(max_levels)
    }

    /// Read-only fill-or-kill admissibility walk: is `needed` quantity
    /// reachable on `side` at prices satisfying `limit`? Early exit as soon
    /// as the answer is known.
    pub fn available_within_limit(
        &self,
        side: OrderSide,
        limit: Option<Decimal>,
        needed: Decimal,
    ) -> bool {
        let book_side = self.side(side);
        let levels: Box<dyn Iterator<Item = &PriceLevel> + '_> = match side {
            OrderSide::Buy => Box::new(book_side.levels.values().rev()),
            OrderSide::Sell => Box::new(book_side.levels.values()),
        };

        let mut reachable = Decimal::ZERO;
        for level in levels {
            if let Some(limit) = limit {
                let within = match side {
                    // Consuming asks with a buy limit.
                    OrderSide::Sell => level.price <= limit,
                    // Consuming bids with a sell limit.
                    OrderSide::Buy => level.price >= limit,
                };
                if !within {
                    break;
                }
            }
            reachable += level.total_quantity;
            if reachable >= needed {
                return true;
            }
        }
        false
    }

    /// Invariant probe: best bid >= best ask is never legal between requests.
    pub fn is_crossed(&self) -> bool {
        match (self.bids.best, self.asks.best) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderType;
    use chrono::Utc;

    fn resting_order(side: OrderSide, price: Decimal, quantity: Decimal, sequence: u64) -> Order {
        Order {
            id: Uuid::new_v4(),
            symbol: "BTC/USDT".to_string(),
            order_type: OrderType::Limit,
            side,
            price: Some(price),
            quantity,
            remaining: quantity,
            sequence,
            status: OrderStatus::Resting,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn insert(book: &mut OrderBook, side: OrderSide, price: u64, quantity: u64, sequence: u64) -> Uuid {
        let order = resting_order(side, Decimal::from(price), Decimal::from(quantity), sequence);
        let id = order.id;
        book.insert_resting(Decimal::from(price), order);
        id
    }

    #[test]
    fn best_price_tracks_extremes() {
        let mut book = OrderBook::new("BTC/USDT");
        assert_eq!(book.best_price(OrderSide::Buy), None);

        insert(&mut book, OrderSide::Buy, 100, 1, 1);
        insert(&mut book, OrderSide::Buy, 102, 1, 2);
        insert(&mut book, OrderSide::Buy, 101, 1, 3);
        insert(&mut book, OrderSide::Sell, 105, 1, 4);
        insert(&mut book, OrderSide::Sell, 104, 1, 5);

        assert_eq!(book.best_price(OrderSide::Buy), Some(Decimal::from(102)));
        assert_eq!(book.best_price(OrderSide::Sell), Some(Decimal::from(104)));
    }

    #[test]
    fn best_price_recomputed_after_level_drains() {
        let mut book = OrderBook::new("BTC/USDT");
        insert(&mut book, OrderSide::Sell, 100, 2, 1);
        insert(&mut book, OrderSide::Sell, 101, 5, 2);

        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(2)).unwrap();
        assert_eq!(fill.price, Decimal::from(100));
        assert!(fill.maker_remaining.is_zero());
        assert_eq!(book.best_price(OrderSide::Sell), Some(Decimal::from(101)));
    }

    #[test]
    fn execute_at_best_consumes_fifo() {
        let mut book = OrderBook::new("BTC/USDT");
        let first = insert(&mut book, OrderSide::Sell, 100, 1, 1);
        let second = insert(&mut book, OrderSide::Sell, 100, 1, 2);

        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(1)).unwrap();
        assert_eq!(fill.order_id, first);

        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(1)).unwrap();
        assert_eq!(fill.order_id, second);
        assert_eq!(book.best_price(OrderSide::Sell), None);
    }

    #[test]
    fn partial_fill_keeps_maker_at_front() {
        let mut book = OrderBook::new("BTC/USDT");
        let maker = insert(&mut book, OrderSide::Sell, 100, 5, 1);
        insert(&mut book, OrderSide::Sell, 100, 5, 2);

        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(2)).unwrap();
        assert_eq!(fill.order_id, maker);
        assert_eq!(fill.maker_remaining, Decimal::from(3));

        // Same maker stays first in line.
        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(1)).unwrap();
        assert_eq!(fill.order_id, maker);

        let depth: Vec<_> = book.depth(OrderSide::Sell, 10).collect();
        assert_eq!(depth[0].quantity, Decimal::from(7));
        assert_eq!(depth[0].order_count, 2);
    }

    #[test]
    fn remove_order_preserves_fifo_of_rest() {
        let mut book = OrderBook::new("BTC/USDT");
        let first = insert(&mut book, OrderSide::Sell, 100, 1, 1);
        let second = insert(&mut book, OrderSide::Sell, 100, 2, 2);
        let third = insert(&mut book, OrderSide::Sell, 100, 3, 3);

        let removed = book
            .remove_order(OrderSide::Sell, Decimal::from(100), second)
            .unwrap();
        assert_eq!(removed.id, second);

        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(1)).unwrap();
        assert_eq!(fill.order_id, first);
        let fill = book.execute_at_best(OrderSide::Sell, Decimal::from(3)).unwrap();
        assert_eq!(fill.order_id, third);
    }

    #[test]
    fn remove_last_order_drops_level() {
        let mut book = OrderBook::new("BTC/USDT");
        let only = insert(&mut book, OrderSide::Buy, 100, 1, 1);
        insert(&mut book, OrderSide::Buy, 99, 1, 2);

        book.remove_order(OrderSide::Buy, Decimal::from(100), only)
            .unwrap();
        assert_eq!(book.best_price(OrderSide::Buy), Some(Decimal::from(99)));
    }

    #[test]
    fn depth_is_bounded_and_ordered_best_to_worst() {
        let mut book = OrderBook::new("BTC/USDT");
        for (i, price) in [101u64, 103, 102, 105, 104].into_iter().enumerate() {
            insert(&mut book, OrderSide::Sell, price, 1, i as u64);
        }

        let asks: Vec<_> = book.depth(OrderSide::Sell, 3).collect();
        assert_eq!(asks.len(), 3);
        assert_eq!(asks[0].price, Decimal::from(101));
        assert_eq!(asks[1].price, Decimal::from(102));
        assert_eq!(asks[2].price, Decimal::from(103));

        for (i, price) in [99u64, 97, 98].into_iter().enumerate() {
            insert(&mut book, OrderSide::Buy, price, 1, 10 + i as u64);
        }
        let bids: Vec<_> = book.depth(OrderSide::Buy, 10).collect();
        assert_eq!(bids[0].price, Decimal::from(99));
        assert_eq!(bids[2].price, Decimal::from(97));
    }

    #[test]
    fn available_within_limit_respects_price_bound() {
        let mut book = OrderBook::new("BTC/USDT");
        insert(&mut book, OrderSide::Sell, 100, 2, 1);
        insert(&mut book, OrderSide::Sell, 101, 2, 2);
        insert(&mut book, OrderSide::Sell, 110, 50, 3);

        // Only 4 reachable at or below 101.
        assert!(book.available_within_limit(
            OrderSide::Sell,
            Some(Decimal::from(101)),
            Decimal::from(4)
        ));
        assert!(!book.available_within_limit(
            OrderSide::Sell,
            Some(Decimal::from(101)),
            Decimal::from(5)
        ));
        // No bound: the far level counts.
        assert!(book.available_within_limit(OrderSide::Sell, None, Decimal::from(54)));
        assert!(!book.available_within_limit(OrderSide::Sell, None, Decimal::from(55)));
    }

    #[test]
    fn available_within_limit_on_bids() {
        let mut book = OrderBook::new("BTC/USDT");
        insert(&mut book, OrderSide::Buy, 101, 2, 1);
        insert(&mut book, OrderSide::Buy, 100, 2, 2);
        insert(&mut book, OrderSide::Buy, 90, 50, 3);

        // Only 4 reachable at or above 100.
        assert!(book.available_within_limit(
            OrderSide::Buy,
            Some(Decimal::from(100)),
            Decimal::from(4)
        ));
        assert!(!book.available_within_limit(
            OrderSide::Buy,
            Some(Decimal::from(100)),
            Decimal::from(5)
        ));
        assert!(book.available_within_limit(OrderSide::Buy, None, Decimal::from(54)));
    }

    #[test]
    fn crossed_probe() {
        let mut book = OrderBook::new("BTC/USDT");
        assert!(!book.is_crossed());

        insert(&mut book, OrderSide::Buy, 99, 1, 1);
        insert(&mut book, OrderSide::Sell, 101, 1, 2);
        assert!(!book.is_crossed());

        insert(&mut book, OrderSide::Buy, 101, 1, 3);
        assert!(book.is_crossed());
    }
}
