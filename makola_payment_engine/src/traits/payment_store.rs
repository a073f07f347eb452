use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Cart, CartId, NewCart, NewOrder, Order, OrderId, OrderLineItem, PaymentStatus};

/// Storage contract for the payment engine.
///
/// The engine treats the store as the single arbiter of the race between verification and
/// webhook deliveries: whatever [`PaymentStore::insert_order_once`] says happened is what
/// happened.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a cart snapshot, replacing any existing cart with the same id. The storefront
    /// owns carts until checkout begins, so a replay of this call is always safe.
    async fn upsert_cart(&self, cart: NewCart) -> Result<Cart, PaymentStoreError>;

    /// Fetches a cart and its line items in one snapshot.
    async fn fetch_cart(&self, cart_id: &CartId) -> Result<Option<Cart>, PaymentStoreError>;

    /// In a single atomic transaction: inserts the order and its line items, deletes the source
    /// cart, and commits.
    ///
    /// If an order already exists for the same `(provider, reference)` pair, or for the same
    /// cart, nothing is written and the existing order is returned with `false`. The unique
    /// indices backing this are the mutual exclusion point for racing observers; a half-created
    /// order is never visible, and a failed attempt leaves the cart intact.
    async fn insert_order_once(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError>;

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;

    async fn fetch_order_by_reference(
        &self,
        provider: &str,
        reference: &str,
    ) -> Result<Option<Order>, PaymentStoreError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderLineItem>, PaymentStoreError>;

    /// The most recently created orders, newest first.
    async fn fetch_recent_orders(&self, limit: i64) -> Result<Vec<Order>, PaymentStoreError>;

    /// Applies a payment status transition, enforcing the transition table in
    /// [`PaymentStatus::can_transition_to`].
    ///
    /// Returns the updated order, or `None` if the order is already in the requested status.
    /// An illegal transition (anything away from `Captured`) is an error.
    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Option<Order>, PaymentStoreError>;

    /// Deletes carts whose last update predates `cutoff`, returning how many were removed.
    /// Materialization disposes of its own cart; this only reclaims abandoned checkouts.
    async fn delete_stale_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, PaymentStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The cart {0} does not exist")]
    CartNotFound(CartId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Illegal payment status change. {0}")]
    PaymentStatusUpdateError(String),
    #[error("Could not encode value for storage: {0}")]
    EncodingError(String),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PaymentStoreError {
    fn from(e: serde_json::Error) -> Self {
        PaymentStoreError::EncodingError(e.to_string())
    }
}
