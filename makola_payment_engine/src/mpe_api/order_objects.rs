use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderLineItem};

/// How a successful reconciliation came about.
#[derive(Debug, Clone)]
pub enum ReconciledOrder {
    /// This call won the race: it created the order and fired the confirmation event.
    Created(Order),
    /// An earlier or racing observation had already materialized the order. This is that order;
    /// nothing was written and no event fired.
    AlreadyMaterialized(Order),
}

impl ReconciledOrder {
    pub fn order(&self) -> &Order {
        match self {
            ReconciledOrder::Created(order) | ReconciledOrder::AlreadyMaterialized(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            ReconciledOrder::Created(order) | ReconciledOrder::AlreadyMaterialized(order) => order,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, ReconciledOrder::Created(_))
    }
}

/// An order together with its line item snapshots, as served to clients. The view is computed
/// the same way no matter which delivery path created the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOrder {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}
