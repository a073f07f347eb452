use chrono::Utc;
use log::{debug, error, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{CartId, NewOrder, NewOrderItem, Order, OrderId, OrderLineItem, PaymentStatus},
    traits::PaymentStoreError,
};

/// The JSON columns of an order, encoded up front so that [`insert_order`] deals in plain
/// strings and its errors stay pure `sqlx::Error`.
struct EncodedOrderJson {
    card: Option<String>,
    amount_mismatch: Option<String>,
    shipping_address: String,
    billing_address: Option<String>,
}

impl EncodedOrderJson {
    fn encode(order: &NewOrder) -> Result<Self, serde_json::Error> {
        Ok(Self {
            card: order.card.as_ref().map(serde_json::to_string).transpose()?,
            amount_mismatch: order.amount_mismatch.as_ref().map(serde_json::to_string).transpose()?,
            shipping_address: serde_json::to_string(&order.shipping_address)?,
            billing_address: order.billing_address.as_ref().map(serde_json::to_string).transpose()?,
        })
    }
}

/// Inserts the order and its line items, returning `false` in the second parameter if an order
/// already existed for the same `(provider, reference)` pair or the same cart.
///
/// The insert is attempted unconditionally and the unique indices arbitrate. A lost race
/// surfaces as a constraint violation, in which case the winner's order is fetched and
/// returned instead. Checking for existence first would leave a window between the check and
/// the insert; this way there is none.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), PaymentStoreError> {
    let json = EncodedOrderJson::encode(&order)?;
    let inserted = match insert_order(&order, &json, &mut *conn).await {
        Ok(created) => {
            insert_order_items(&created.order_id, &order.items, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", created.order_id, created.id);
            (created, true)
        },
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            trace!(
                "📝️ Order for {}/{} already exists ({}). Fetching the winner instead.",
                order.provider,
                order.reference,
                db_err
            );
            let existing = fetch_winning_order(&order, conn).await?;
            (existing, false)
        },
        Err(e) => return Err(e.into()),
    };
    Ok(inserted)
}

/// After a unique violation, the existing order is found either by the observation's reference
/// or, when a different reference already consumed the cart, by the cart id.
async fn fetch_winning_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentStoreError> {
    if let Some(existing) = fetch_order_by_reference(&order.provider, &order.reference, &mut *conn).await? {
        return Ok(existing);
    }
    fetch_order_by_cart_id(&order.cart_id, conn).await?.ok_or_else(|| {
        PaymentStoreError::DatabaseError(format!(
            "Order insert for {}/{} hit a unique constraint but no existing order matches it",
            order.provider, order.reference
        ))
    })
}

/// Inserts a new order using the given connection. This is not atomic. Callers embed it in a
/// transaction and pass `&mut *tx` as the connection argument.
async fn insert_order(order: &NewOrder, json: &EncodedOrderJson, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let captured_at = (order.payment_status == PaymentStatus::Captured).then(Utc::now);
    let result = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                cart_id,
                customer_email,
                currency,
                subtotal,
                total,
                payment_status,
                provider,
                reference,
                transaction_id,
                channel,
                gateway_response,
                paid_at,
                captured_at,
                card,
                amount_mismatch,
                shipping_address,
                billing_address
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.clone())
    .bind(order.cart_id.clone())
    .bind(order.customer_email.clone())
    .bind(order.currency)
    .bind(order.subtotal)
    .bind(order.total)
    .bind(order.payment_status.to_string())
    .bind(order.provider.clone())
    .bind(order.reference.clone())
    .bind(order.transaction_id.clone())
    .bind(order.channel.clone())
    .bind(order.gateway_response.clone())
    .bind(order.paid_at)
    .bind(captured_at)
    .bind(json.card.clone())
    .bind(json.amount_mismatch.clone())
    .bind(json.shipping_address.clone())
    .bind(json.billing_address.clone())
    .fetch_one(conn)
    .await?;
    Ok(result)
}

async fn insert_order_items(
    order_id: &OrderId,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), PaymentStoreError> {
    for item in items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, variant_id, title, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(order_id.clone())
        .bind(item.variant_id.clone())
        .bind(item.title.clone())
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    trace!("📝️ {} line items written for order [{order_id}]", items.len());
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_reference(
    provider: &str,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE provider = $1 AND reference = $2")
        .bind(provider)
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_cart_id(
    cart_id: &CartId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE cart_id = $1").bind(cart_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderLineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The most recently created orders, newest first.
pub async fn fetch_recent_orders(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC, id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Applies a payment status transition, enforcing [`PaymentStatus::can_transition_to`].
///
/// Returns `None` when the order is already in the requested status. An illegal transition is
/// an error; in particular nothing ever moves an order away from `Captured`.
pub async fn update_payment_status(
    order_id: &OrderId,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentStoreError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))?;
    let old_status = order.payment_status;
    if old_status == status {
        debug!("📝️ Order [{order_id}] already has status {status}. No action to take");
        return Ok(None);
    }
    if !old_status.can_transition_to(status) {
        error!(
            "📝️ Order [{order_id}] cannot be transitioned from {old_status} to {status}. If there is a valid use \
             case, perform a manual adjustment now and submit a ticket so that it can be handled properly in the \
             future."
        );
        return Err(PaymentStoreError::PaymentStatusUpdateError(format!(
            "Order {order_id} cannot move from {old_status} to {status}"
        )));
    }
    let captured_at = (status == PaymentStatus::Captured).then(Utc::now);
    let updated = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_status = $1,
                captured_at = COALESCE($2, captured_at),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $3
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(captured_at)
    .bind(order_id.as_str())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{order_id}] moved from {old_status} to {status}");
    Ok(Some(updated))
}
