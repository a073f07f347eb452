use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Address, Cart, CartId, CorrelationMetadata, NewCart},
    traits::{PaymentStore, PaymentStoreError},
};

/// `CartApi` is the read/write surface for cart snapshots. The storefront checkout seeds carts
/// through it, payment initialization reads them, and the sweeper disposes of abandoned ones.
pub struct CartApi<B> {
    db: B,
}

impl<B> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi")
    }
}

impl<B> CartApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CartApi<B>
where B: PaymentStore
{
    /// Loads the cart and its line items in a single snapshot.
    pub async fn cart(&self, id: &CartId) -> Result<Option<Cart>, PaymentStoreError> {
        self.db.fetch_cart(id).await
    }

    /// Stores a cart snapshot, replacing any prior contents for the same id.
    pub async fn save_cart(&self, cart: NewCart) -> Result<Cart, PaymentStoreError> {
        let stored = self.db.upsert_cart(cart).await?;
        debug!("🧺️ Cart {} saved with {} line items", stored.cart_id, stored.items.len());
        Ok(stored)
    }

    /// Deletes carts untouched for longer than `ttl`, returning how many were removed.
    pub async fn purge_stale_carts(&self, ttl: Duration) -> Result<u64, PaymentStoreError> {
        let cutoff = Utc::now() - ttl;
        let removed = self.db.delete_stale_carts(cutoff).await?;
        if removed > 0 {
            info!("🧺️ Purged {removed} carts untouched since {cutoff}");
        }
        Ok(removed)
    }
}

/// Picks the shipping and billing addresses for an order-to-be.
///
/// Sources, in order: the cart's stored addresses, then the address the gateway observation
/// carried in its metadata, then an explicit placeholder. The placeholder path flags the order
/// for manual follow-up; it never blocks materialization.
pub fn resolve_addresses(cart: &Cart, metadata: &CorrelationMetadata) -> (Address, Option<Address>) {
    let shipping = cart
        .shipping_address
        .clone()
        .or_else(|| metadata.shipping_address.clone())
        .unwrap_or_else(|| {
            warn!(
                "🧺️ No shipping address on cart {} or in the payment metadata. Using a placeholder; the order will \
                 need manual follow-up.",
                cart.cart_id
            );
            Address::placeholder()
        });
    let billing = cart.billing_address.clone();
    (shipping, billing)
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use mps_common::Currency;

    use super::*;

    fn bare_cart() -> Cart {
        Cart {
            cart_id: "c1".into(),
            customer_email: "ama@example.com".to_string(),
            currency: Currency::Ghs,
            shipping_address: None,
            billing_address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![],
        }
    }

    #[test]
    fn cart_address_wins() {
        let mut cart = bare_cart();
        let home = Address { line1: Some("14 Oxford St".to_string()), city: Some("Accra".to_string()), ..Default::default() };
        cart.shipping_address = Some(home.clone());
        let metadata = CorrelationMetadata {
            shipping_address: Some(Address { line1: Some("Elsewhere".to_string()), ..Default::default() }),
            ..Default::default()
        };
        let (shipping, billing) = resolve_addresses(&cart, &metadata);
        assert_eq!(shipping, home);
        assert!(billing.is_none());
    }

    #[test]
    fn metadata_address_is_the_fallback() {
        let cart = bare_cart();
        let from_gateway = Address { line1: Some("PO Box 123".to_string()), ..Default::default() };
        let metadata = CorrelationMetadata { shipping_address: Some(from_gateway.clone()), ..Default::default() };
        let (shipping, _) = resolve_addresses(&cart, &metadata);
        assert_eq!(shipping, from_gateway);
    }

    #[test]
    fn placeholder_when_no_source_has_an_address() {
        let (shipping, billing) = resolve_addresses(&bare_cart(), &CorrelationMetadata::default());
        assert!(shipping.is_placeholder());
        assert!(billing.is_none());
    }
}
