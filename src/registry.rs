use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::OrderSide;

/// Where a resting order lives: enough to reach its level directly on cancel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrderLocation {
    pub side: OrderSide,
    pub price: Decimal,
}

/// Per-symbol index of resting orders. Entries are added when an order
/// begins resting and removed when it leaves the book for any reason;
/// terminal orders are never present.
#[derive(Debug, Default)]
pub struct OrderRegistry {
    entries: HashMap<Uuid, OrderLocation>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, order_id: Uuid, location: OrderLocation) {
        self.entries.insert(order_id, location);
    }

    pub fn remove(&mut self, order_id: &Uuid) -> Option<OrderLocation> {
        self.entries.remove(order_id)
    }

    pub fn get(&self, order_id: &Uuid) -> Option<OrderLocation> {
        self.entries.get(order_id).copied()
    }

    pub fn contains(&self, order_id: &Uuid) -> bool {
        self.entries.contains_key(order_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
