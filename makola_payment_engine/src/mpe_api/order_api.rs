use std::fmt::Debug;

use crate::{
    db_types::{Order, OrderId},
    mpe_api::order_objects::FullOrder,
    traits::{PaymentStore, PaymentStoreError},
};

/// `OrderApi` answers order queries. Orders are immutable apart from their payment status, so
/// every read here is a plain snapshot.
pub struct OrderApi<B> {
    db: B,
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderApi<B>
where B: PaymentStore
{
    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<FullOrder>, PaymentStoreError> {
        let Some(order) = self.db.fetch_order_by_id(order_id).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(&order.order_id).await?;
        Ok(Some(FullOrder { order, items }))
    }

    pub async fn order_by_reference(
        &self,
        provider: &str,
        reference: &str,
    ) -> Result<Option<FullOrder>, PaymentStoreError> {
        let Some(order) = self.db.fetch_order_by_reference(provider, reference).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(&order.order_id).await?;
        Ok(Some(FullOrder { order, items }))
    }

    pub async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, PaymentStoreError> {
        self.db.fetch_recent_orders(limit).await
    }
}
