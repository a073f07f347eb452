use std::fmt::Debug;

use log::*;
use mps_common::MinorUnits;

use crate::{
    db_types::{
        AmountMismatch,
        Cart,
        ChargeStatus,
        NewOrder,
        NewOrderItem,
        Order,
        OrderId,
        PaymentStatus,
        VerifiedPayment,
    },
    events::{EventProducers, OrderConfirmedEvent},
    mpe_api::{cart_api::resolve_addresses, errors::ReconciliationError, order_objects::ReconciledOrder},
    traits::PaymentStore,
};

/// Deltas up to one major unit are treated as expected fee adjustments unless configured
/// otherwise.
pub const DEFAULT_AMOUNT_TOLERANCE: i64 = 100;

/// `ReconciliationApi` is the primary API of the engine. It drives a verified gateway payment to
/// its terminal outcome: exactly one immutable order for the cart it references.
///
/// Verification redirects and webhook deliveries race by design. Both call [`Self::reconcile`]
/// with the same shape of observation, and the storage layer's unique indices arbitrate: the
/// first to commit creates the order, every later arrival reads the winner's order back.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    tolerance: MinorUnits,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, tolerance: MinorUnits::from(DEFAULT_AMOUNT_TOLERANCE) }
    }

    /// Overrides the mismatch tolerance. The tolerance only classifies recorded mismatches and
    /// their log severity; it never decides whether an order materializes.
    pub fn with_tolerance(mut self, tolerance: MinorUnits) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl<B> ReconciliationApi<B>
where B: PaymentStore
{
    /// Reconciles one payment observation against its cart.
    ///
    /// The observation may arrive any number of times, over either delivery path, in any order.
    /// Exactly one call ends in [`ReconciledOrder::Created`]; every other ends in
    /// [`ReconciledOrder::AlreadyMaterialized`] carrying the same order, or in an error that
    /// changed nothing.
    pub async fn reconcile(&self, payment: &VerifiedPayment) -> Result<ReconciledOrder, ReconciliationError> {
        let Some(cart_id) = payment.metadata.cart_id.clone() else {
            warn!(
                "🧾️ Observation {}/{} carries no cart reference. It cannot be reconciled automatically and needs \
                 manual review.",
                payment.provider, payment.reference
            );
            return Err(ReconciliationError::MissingCartReference(payment.reference.clone()));
        };
        let cart = match self.db.fetch_cart(&cart_id).await? {
            Some(cart) => cart,
            None => return self.resolve_missing_cart(payment).await,
        };
        if cart.is_empty() {
            warn!("🧾️ Cart {cart_id} has no line items. Refusing to materialize an empty order.");
            return Err(ReconciliationError::EmptyCart(cart_id));
        }
        let mismatch = self.check_amounts(&cart, payment);
        if payment.status != ChargeStatus::Success {
            debug!(
                "🧾️ Charge {} for cart {cart_id} is '{}'. Nothing to materialize.",
                payment.reference, payment.status
            );
            return Err(ReconciliationError::PaymentNotSuccessful(payment.status, payment.reference.clone()));
        }
        let order = build_order(cart, payment, mismatch);
        let (order, created) = self.db.insert_order_once(order).await?;
        if created {
            info!(
                "🧾️ Order [{}] materialized from cart {} for {} {} via {}",
                order.order_id, order.cart_id, order.currency, order.total, order.provider
            );
            let items = self.db.fetch_order_items(&order.order_id).await?;
            self.call_order_confirmed_hook(OrderConfirmedEvent::new(order.clone(), items)).await;
            Ok(ReconciledOrder::Created(order))
        } else {
            debug!(
                "🧾️ Order [{}] already existed for observation {}/{}. Returning it unchanged.",
                order.order_id, payment.provider, payment.reference
            );
            self.check_agreement(&order, payment);
            Ok(ReconciledOrder::AlreadyMaterialized(order))
        }
    }

    /// Records a failed charge. A failure can only move an order that has not been captured;
    /// materialization is final.
    ///
    /// Returns the updated order if a status transition happened, `None` otherwise.
    pub async fn record_failed_charge(&self, payment: &VerifiedPayment) -> Result<Option<Order>, ReconciliationError> {
        match self.db.fetch_order_by_reference(&payment.provider, &payment.reference).await? {
            None => {
                info!(
                    "🧾️ Failed charge {}/{} has no matching order. Nothing to record.",
                    payment.provider, payment.reference
                );
                Ok(None)
            },
            Some(order) if order.payment_status == PaymentStatus::Captured => {
                warn!(
                    "🧾️ Failed charge {}/{} arrived after order [{}] was captured. Materialization is final; the \
                     failure is logged and goes nowhere else.",
                    payment.provider, payment.reference, order.order_id
                );
                Ok(None)
            },
            Some(order) => {
                let updated = self.db.update_payment_status(&order.order_id, PaymentStatus::Failed).await?;
                if updated.is_some() {
                    info!("🧾️ Order [{}] marked as Failed after gateway failure notice", order.order_id);
                }
                Ok(updated)
            },
        }
    }

    /// The cart is gone. If an order exists for the observation's reference, the cart was
    /// consumed by materialization and this is a duplicate delivery. Otherwise the cart never
    /// existed or was swept, and there is nothing to attach the payment to.
    async fn resolve_missing_cart(&self, payment: &VerifiedPayment) -> Result<ReconciledOrder, ReconciliationError> {
        match self.db.fetch_order_by_reference(&payment.provider, &payment.reference).await? {
            Some(order) => {
                self.check_agreement(&order, payment);
                Ok(ReconciledOrder::AlreadyMaterialized(order))
            },
            None => {
                let cart_id = payment.metadata.cart_id.clone().unwrap_or_else(|| "?".into());
                warn!("🧾️ Cart {cart_id} does not exist and no order matches {}/{}.", payment.provider, payment.reference);
                Err(ReconciliationError::CartNotFound(cart_id))
            },
        }
    }

    /// Compares the verified amount to the cart's expected total. A discrepancy is always
    /// recorded on the order; the tolerance only decides how loudly it is reported.
    fn check_amounts(&self, cart: &Cart, payment: &VerifiedPayment) -> Option<AmountMismatch> {
        let mismatch = AmountMismatch::check(cart.total(), payment.amount, self.tolerance)?;
        if mismatch.within_tolerance {
            info!(
                "🧾️ Amount for cart {} differs from the verified charge by {} minor units (expected {}, received \
                 {}). Within tolerance; recording and continuing.",
                cart.cart_id, mismatch.delta, mismatch.expected, mismatch.received
            );
        } else {
            warn!(
                "🧾️ Amount for cart {} differs from the verified charge by {} minor units (expected {}, received \
                 {}). Out of tolerance; recording for review and continuing.",
                cart.cart_id, mismatch.delta, mismatch.expected, mismatch.received
            );
        }
        Some(mismatch)
    }

    /// A repeat observation must agree with the stored order. When it does not, the stored
    /// order stays authoritative and the disagreement goes to the log.
    fn check_agreement(&self, order: &Order, payment: &VerifiedPayment) {
        if order.reference != payment.reference {
            warn!(
                "🧾️ Cart {} already materialized as order [{}] under reference {}, but a second charge {} exists \
                 for it. This needs a manual refund review.",
                order.cart_id, order.order_id, order.reference, payment.reference
            );
            return;
        }
        let recorded_amount = order.mismatch().map(|m| m.received).unwrap_or(order.total);
        if recorded_amount != payment.amount {
            warn!(
                "🧾️ Repeat observation of {}/{} disagrees on amount: order [{}] recorded {}, observation says {}. \
                 Keeping the stored order.",
                payment.provider, payment.reference, order.order_id, recorded_amount, payment.amount
            );
        }
        if payment.status != ChargeStatus::Success && order.payment_status == PaymentStatus::Captured {
            warn!(
                "🧾️ Repeat observation of {}/{} reports charge status '{}', but order [{}] is already captured. \
                 Keeping the stored order.",
                payment.provider, payment.reference, payment.status, order.order_id
            );
        }
    }

    async fn call_order_confirmed_hook(&self, event: OrderConfirmedEvent) {
        for emitter in &self.producers.order_confirmed_producer {
            debug!("🧾️ Notifying order confirmed hook subscribers for [{}]", event.order.order_id);
            emitter.publish_event(event.clone()).await;
        }
    }
}

/// Assembles the order the materializer will write. The order snapshots the cart's contents and
/// totals; what the charge actually settled for lives in the mismatch record.
fn build_order(cart: Cart, payment: &VerifiedPayment, mismatch: Option<AmountMismatch>) -> NewOrder {
    let (shipping_address, billing_address) = resolve_addresses(&cart, &payment.metadata);
    let items = cart.items.iter().map(NewOrderItem::from).collect();
    let subtotal = cart.subtotal();
    let total = cart.total();
    NewOrder {
        order_id: OrderId::random(),
        cart_id: cart.cart_id,
        customer_email: cart.customer_email,
        currency: cart.currency,
        subtotal,
        total,
        payment_status: PaymentStatus::Captured,
        provider: payment.provider.clone(),
        reference: payment.reference.clone(),
        transaction_id: payment.transaction_id.clone(),
        channel: payment.channel.to_string(),
        gateway_response: payment.gateway_response.clone(),
        paid_at: payment.paid_at,
        card: payment.card.clone(),
        amount_mismatch: mismatch,
        shipping_address,
        billing_address,
        items,
    }
}
