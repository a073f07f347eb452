use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{Cart, CartId, CartLineItem, NewCart, NewCartItem},
    traits::PaymentStoreError,
};

/// Private row shape for the carts table. Addresses live in JSON columns and are decoded into
/// [`Cart`] on the way out.
#[derive(Debug, FromRow)]
struct CartRow {
    cart_id: CartId,
    customer_email: String,
    currency: mps_common::Currency,
    shipping_address: Option<String>,
    billing_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self, items: Vec<CartLineItem>) -> Result<Cart, PaymentStoreError> {
        let shipping_address = self.shipping_address.as_deref().map(serde_json::from_str).transpose()?;
        let billing_address = self.billing_address.as_deref().map(serde_json::from_str).transpose()?;
        Ok(Cart {
            cart_id: self.cart_id,
            customer_email: self.customer_email,
            currency: self.currency,
            shipping_address,
            billing_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

/// Writes a cart snapshot, replacing the row and the full item set if the cart already exists.
/// This is not atomic on its own; callers wrap it in a transaction.
pub async fn upsert_cart(cart: NewCart, conn: &mut SqliteConnection) -> Result<Cart, PaymentStoreError> {
    let shipping = cart.shipping_address.as_ref().map(serde_json::to_string).transpose()?;
    let billing = cart.billing_address.as_ref().map(serde_json::to_string).transpose()?;
    sqlx::query(
        r#"
            INSERT INTO carts (cart_id, customer_email, currency, shipping_address, billing_address)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (cart_id) DO UPDATE SET
                customer_email = excluded.customer_email,
                currency = excluded.currency,
                shipping_address = excluded.shipping_address,
                billing_address = excluded.billing_address,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(cart.cart_id.clone())
    .bind(cart.customer_email)
    .bind(cart.currency)
    .bind(shipping)
    .bind(billing)
    .execute(&mut *conn)
    .await?;
    replace_cart_items(&cart.cart_id, &cart.items, conn).await?;
    debug!("📝️ Cart {} saved with {} line items", cart.cart_id, cart.items.len());
    fetch_cart(&cart.cart_id, conn).await?.ok_or_else(|| PaymentStoreError::CartNotFound(cart.cart_id))
}

/// Replaces the entire line item set for a cart. Item-level diffing buys nothing at cart sizes.
async fn replace_cart_items(
    cart_id: &CartId,
    items: &[NewCartItem],
    conn: &mut SqliteConnection,
) -> Result<(), PaymentStoreError> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id.clone()).execute(&mut *conn).await?;
    for item in items {
        sqlx::query(
            r#"
                INSERT INTO cart_items (cart_id, variant_id, title, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(cart_id.clone())
        .bind(item.variant_id.clone())
        .bind(item.title.clone())
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Fetches a cart and its line items in one snapshot.
pub async fn fetch_cart(cart_id: &CartId, conn: &mut SqliteConnection) -> Result<Option<Cart>, PaymentStoreError> {
    let row: Option<CartRow> = sqlx::query_as("SELECT * FROM carts WHERE cart_id = $1")
        .bind(cart_id.clone())
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let items = sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY id")
        .bind(cart_id.clone())
        .fetch_all(conn)
        .await?;
    row.into_cart(items).map(Some)
}

/// Deletes a cart, cascading over its line items. Returns whether a cart was actually removed.
pub async fn delete_cart(cart_id: &CartId, conn: &mut SqliteConnection) -> Result<bool, PaymentStoreError> {
    let result = sqlx::query("DELETE FROM carts WHERE cart_id = $1").bind(cart_id.clone()).execute(conn).await?;
    trace!("📝️ Deleted cart {cart_id} ({} rows)", result.rows_affected());
    Ok(result.rows_affected() > 0)
}

/// Deletes carts whose last update predates the cutoff, returning how many were removed.
pub async fn delete_carts_older_than(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, PaymentStoreError> {
    let result = sqlx::query("DELETE FROM carts WHERE updated_at < $1").bind(cutoff).execute(conn).await?;
    Ok(result.rows_affected())
}
