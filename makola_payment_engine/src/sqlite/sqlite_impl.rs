//! `SqliteDatabase` is a concrete implementation of a Makola Payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`PaymentStore`] trait defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{carts, db_url, new_pool, orders};
use crate::{
    db_types::{Cart, CartId, NewCart, NewOrder, Order, OrderId, OrderLineItem, PaymentStatus},
    traits::{PaymentStore, PaymentStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn upsert_cart(&self, cart: NewCart) -> Result<Cart, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::upsert_cart(cart, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Cart {} has been saved in the DB", cart.cart_id);
        Ok(cart)
    }

    async fn fetch_cart(&self, cart_id: &CartId) -> Result<Option<Cart>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        carts::fetch_cart(cart_id, &mut conn).await
    }

    /// Materializes the order in a single atomic transaction: the order row, its line items and
    /// the consumption of the source cart all land together or not at all.
    ///
    /// A lost race against another observer surfaces inside [`orders::idempotent_insert`] as a
    /// unique constraint hit, in which case the winner's order comes back with `false` and the
    /// cart is left for the winner's transaction to consume.
    async fn insert_order_once(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError> {
        let cart_id = order.cart_id.clone();
        let mut tx = self.pool.begin().await?;
        let (order, created) = orders::idempotent_insert(order, &mut tx).await?;
        if created {
            let removed = carts::delete_cart(&cart_id, &mut tx).await?;
            if !removed {
                debug!("🗃️ Cart {cart_id} was already gone when order [{}] materialized", order.order_id);
            }
        }
        tx.commit().await?;
        if created {
            debug!("🗃️ Order [{}] materialized and cart {cart_id} consumed", order.order_id);
        }
        Ok((order, created))
    }

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_reference(
        &self,
        provider: &str,
        reference: &str,
    ) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_reference(provider, reference, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderLineItem>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_recent_orders(&self, limit: i64) -> Result<Vec<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_recent_orders(limit, &mut conn).await?;
        Ok(result)
    }

    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_payment_status(order_id, status, &mut conn).await
    }

    async fn delete_stale_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let removed = carts::delete_carts_older_than(cutoff, &mut conn).await?;
        if removed > 0 {
            info!("🗃️ Swept {removed} stale carts last updated before {cutoff}");
        }
        Ok(removed)
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
