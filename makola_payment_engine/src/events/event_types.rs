use crate::db_types::{Order, OrderLineItem};

/// Fired exactly once per order, by the reconciliation call that created it, after the creating
/// transaction has committed. Racing observers that lose the materialization race never fire it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order, items: Vec<OrderLineItem>) -> Self {
        Self { order, items }
    }
}
