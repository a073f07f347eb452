use async_trait::async_trait;
use chrono::{DateTime, Utc};
use makola_payment_engine::{
    db_types::{
        Address,
        Cart,
        CartId,
        CartLineItem,
        ChargeStatus,
        CorrelationMetadata,
        NewCart,
        NewOrder,
        Order,
        OrderId,
        OrderLineItem,
        PaymentChannel,
        PaymentStatus,
        VerifiedPayment,
    },
    PaymentStore,
    PaymentStoreError,
};
use mockall::mock;
use mps_common::Currency;

use crate::integrations::{CheckoutSession, PaymentProvider, ProviderError, WebhookEvent};

mock! {
    pub PaymentStore {}

    impl Clone for PaymentStore {
        fn clone(&self) -> Self;
    }

    impl PaymentStore for PaymentStore {
        fn url(&self) -> &str;
        async fn upsert_cart(&self, cart: NewCart) -> Result<Cart, PaymentStoreError>;
        async fn fetch_cart(&self, cart_id: &CartId) -> Result<Option<Cart>, PaymentStoreError>;
        async fn insert_order_once(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError>;
        async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;
        async fn fetch_order_by_reference(&self, provider: &str, reference: &str) -> Result<Option<Order>, PaymentStoreError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderLineItem>, PaymentStoreError>;
        async fn fetch_recent_orders(&self, limit: i64) -> Result<Vec<Order>, PaymentStoreError>;
        async fn update_payment_status(&self, order_id: &OrderId, status: PaymentStatus) -> Result<Option<Order>, PaymentStoreError>;
        async fn delete_stale_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, PaymentStoreError>;
        async fn close(&mut self) -> Result<(), PaymentStoreError>;
    }
}

/// A canned gateway for route tests. `verify` always reports the configured payment; webhook
/// parsing is exercised against the real provider implementations instead.
pub struct StubProvider {
    pub payment: VerifiedPayment,
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn signature_header(&self) -> &'static str {
        "x-stub-signature"
    }

    async fn initialize(&self, cart: &Cart) -> Result<CheckoutSession, ProviderError> {
        Ok(CheckoutSession {
            provider: "stub".to_string(),
            authorization_url: format!("https://checkout.example.com/{}", cart.cart_id),
            access_code: Some("AC_stub".to_string()),
            reference: self.payment.reference.clone(),
        })
    }

    async fn verify(&self, _reference: &str) -> Result<VerifiedPayment, ProviderError> {
        Ok(self.payment.clone())
    }

    fn parse_webhook(&self, _body: &[u8], _signature: &str) -> Result<WebhookEvent, ProviderError> {
        Err(ProviderError::InvalidSignature)
    }
}

//----------------------------------------------  Fixtures  ----------------------------------------------------

pub fn cart_fixture(cart_id: &str) -> Cart {
    let items = vec![
        CartLineItem {
            id: 1,
            cart_id: cart_id.into(),
            variant_id: "kente-red".to_string(),
            title: "Kente stole".to_string(),
            unit_price: 2000.into(),
            quantity: 2,
        },
        CartLineItem {
            id: 2,
            cart_id: cart_id.into(),
            variant_id: "shea-butter".to_string(),
            title: "Shea butter".to_string(),
            unit_price: 1500.into(),
            quantity: 1,
        },
    ];
    Cart {
        cart_id: cart_id.into(),
        customer_email: "ama@example.com".to_string(),
        currency: Currency::Ghs,
        shipping_address: Some(Address {
            name: Some("Ama Serwaa".to_string()),
            line1: Some("14 Oxford St, Osu".to_string()),
            city: Some("Accra".to_string()),
            ..Default::default()
        }),
        billing_address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        items,
    }
}

pub fn empty_cart_fixture(cart_id: &str) -> Cart {
    Cart { items: vec![], ..cart_fixture(cart_id) }
}

pub fn order_fixture(order_id: &str, cart_id: &str, reference: &str) -> Order {
    Order {
        id: 1,
        order_id: OrderId(order_id.to_string()),
        cart_id: cart_id.into(),
        customer_email: "ama@example.com".to_string(),
        currency: Currency::Ghs,
        subtotal: 5500.into(),
        total: 5500.into(),
        payment_status: PaymentStatus::Captured,
        provider: "paystack".to_string(),
        reference: reference.to_string(),
        transaction_id: "302961".to_string(),
        channel: "card".to_string(),
        gateway_response: "Approved".to_string(),
        paid_at: Some(Utc::now()),
        captured_at: Some(Utc::now()),
        card: None,
        amount_mismatch: None,
        shipping_address: "{}".to_string(),
        billing_address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn order_items_fixture(order_id: &str) -> Vec<OrderLineItem> {
    vec![OrderLineItem {
        id: 1,
        order_id: OrderId(order_id.to_string()),
        variant_id: "kente-red".to_string(),
        title: "Kente stole".to_string(),
        unit_price: 2000.into(),
        quantity: 2,
    }]
}

pub fn payment_fixture(cart_id: &str, reference: &str, amount: i64, status: ChargeStatus) -> VerifiedPayment {
    VerifiedPayment {
        provider: "stub".to_string(),
        reference: reference.to_string(),
        transaction_id: "302961".to_string(),
        amount: amount.into(),
        currency: Currency::Ghs,
        status,
        channel: PaymentChannel::Card,
        paid_at: Some(Utc::now()),
        gateway_response: "Approved".to_string(),
        metadata: CorrelationMetadata { cart_id: Some(cart_id.into()), ..Default::default() },
        card: None,
    }
}
