use std::sync::Arc;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use makola_payment_engine::{
    db_types::ChargeStatus,
    events::EventProducers,
    CartApi,
    OrderApi,
    ReconciliationApi,
};
use mps_common::Secret;
use paystack_tools::{sign_payload, PaystackConfig, PAYSTACK_SIGNATURE_HEADER};
use serde_json::json;

use super::{
    helpers::{get_request, post_json, post_raw},
    mocks::{
        cart_fixture,
        empty_cart_fixture,
        order_fixture,
        order_items_fixture,
        payment_fixture,
        MockPaymentStore,
        StubProvider,
    },
};
use crate::{
    config::ServerOptions,
    integrations::{paystack::PaystackProvider, ProviderRegistry},
    routes::{InitializePaymentRoute, PaymentWebhookRoute, SubmitVerifyPaymentRoute, VerifyPaymentRoute},
    server::json_config,
};

const WEBHOOK_SECRET: &str = "sk_test_d41d8cd98f00b204e9800998";

fn stub_registry(status: ChargeStatus) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let payment = payment_fixture("cart-1", "mko-ps-testref01", 5500, status);
    registry.register(Arc::new(StubProvider { payment }));
    registry
}

fn paystack_registry() -> ProviderRegistry {
    let config = PaystackConfig {
        api_url: "http://localhost:1".to_string(),
        secret_key: Secret::new(WEBHOOK_SECRET.to_string()),
        callback_url: None,
    };
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(PaystackProvider::new(config).unwrap()));
    registry
}

fn server_options() -> ServerOptions {
    ServerOptions { use_x_forwarded_for: false, use_forwarded: false }
}

//------------------------------------------   Initialize payment  ---------------------------------------------

#[actix_web::test]
async fn initialize_with_unknown_provider_is_503() {
    let _ = env_logger::try_init();
    let (status, body) =
        post_json("/payments/quickteller/initialize", json!({ "cart_id": "cart-1" }), configure_initialize).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("quickteller"));
}

#[actix_web::test]
async fn initialize_for_unknown_cart_is_404() {
    let _ = env_logger::try_init();
    let (status, body) =
        post_json("/payments/stub/initialize", json!({ "cart_id": "no-such-cart" }), configure_initialize).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("does not exist"));
}

#[actix_web::test]
async fn initialize_for_empty_cart_is_400() {
    let _ = env_logger::try_init();
    let (status, body) =
        post_json("/payments/stub/initialize", json!({ "cart_id": "cart-empty" }), configure_initialize).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("no line items"));
}

#[actix_web::test]
async fn initialize_with_a_malformed_body_is_400() {
    let _ = env_logger::try_init();
    let headers = vec![("content-type", "application/json".to_string())];
    let (status, body) =
        post_raw("/payments/stub/initialize", "{\"cart_id\": ".to_string(), headers, configure_initialize).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Could not read request body"));
}

#[actix_web::test]
async fn initialize_returns_a_checkout_session() {
    let _ = env_logger::try_init();
    let (status, body) =
        post_json("/payments/stub/initialize", json!({ "cart_id": "cart-1" }), configure_initialize).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("authorization_url"));
    assert!(body.contains("mko-ps-testref01"));
}

fn configure_initialize(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_cart().returning(|cart_id| match cart_id.as_str() {
        "cart-1" => Ok(Some(cart_fixture("cart-1"))),
        "cart-empty" => Ok(Some(empty_cart_fixture("cart-empty"))),
        _ => Ok(None),
    });
    cfg.service(InitializePaymentRoute::<MockPaymentStore>::new())
        .app_data(json_config())
        .app_data(web::Data::new(CartApi::new(store)))
        .app_data(web::Data::new(stub_registry(ChargeStatus::Success)));
}

//--------------------------------------------   Verify payment  -----------------------------------------------

#[actix_web::test]
async fn verify_materializes_the_order() {
    let _ = env_logger::try_init();
    let (status, body) =
        get_request("/payments/stub/verify?reference=mko-ps-testref01", configure_verify_fresh_cart).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("mko-order001"));
    assert!(body.contains("Kente stole"));
}

#[actix_web::test]
async fn verify_accepts_the_reference_in_a_post_body() {
    let _ = env_logger::try_init();
    let (status, body) =
        post_json("/payments/stub/verify", json!({ "reference": "mko-ps-testref01" }), configure_verify_fresh_cart)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("mko-order001"));
}

/// The cart is gone because a previous observation materialized it. Re-verifying must return
/// the same order, never a second one and never an error.
#[actix_web::test]
async fn reverify_after_materialization_returns_the_same_order() {
    let _ = env_logger::try_init();
    let (status, body) =
        get_request("/payments/stub/verify?reference=mko-ps-testref01", configure_verify_consumed_cart).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("mko-order001"));
}

#[actix_web::test]
async fn verify_of_a_failed_charge_is_400() {
    let _ = env_logger::try_init();
    let (status, body) =
        get_request("/payments/stub/verify?reference=mko-ps-testref01", configure_verify_failed_charge).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("failed"));
}

fn configure_verify_fresh_cart(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_cart().returning(|_| Ok(Some(cart_fixture("cart-1"))));
    store
        .expect_insert_order_once()
        .returning(|_| Ok((order_fixture("mko-order001", "cart-1", "mko-ps-testref01"), true)));
    store.expect_fetch_order_items().returning(|_| Ok(order_items_fixture("mko-order001")));
    let mut reader = MockPaymentStore::new();
    reader
        .expect_fetch_order_by_id()
        .returning(|_| Ok(Some(order_fixture("mko-order001", "cart-1", "mko-ps-testref01"))));
    reader.expect_fetch_order_items().returning(|_| Ok(order_items_fixture("mko-order001")));
    cfg.service(VerifyPaymentRoute::<MockPaymentStore>::new())
        .service(SubmitVerifyPaymentRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(OrderApi::new(reader)))
        .app_data(web::Data::new(stub_registry(ChargeStatus::Success)));
}

fn configure_verify_consumed_cart(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_cart().returning(|_| Ok(None));
    store
        .expect_fetch_order_by_reference()
        .returning(|_, _| Ok(Some(order_fixture("mko-order001", "cart-1", "mko-ps-testref01"))));
    let mut reader = MockPaymentStore::new();
    reader
        .expect_fetch_order_by_id()
        .returning(|_| Ok(Some(order_fixture("mko-order001", "cart-1", "mko-ps-testref01"))));
    reader.expect_fetch_order_items().returning(|_| Ok(order_items_fixture("mko-order001")));
    cfg.service(VerifyPaymentRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(OrderApi::new(reader)))
        .app_data(web::Data::new(stub_registry(ChargeStatus::Success)));
}

fn configure_verify_failed_charge(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_cart().returning(|_| Ok(Some(cart_fixture("cart-1"))));
    let reader = MockPaymentStore::new();
    cfg.service(VerifyPaymentRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(OrderApi::new(reader)))
        .app_data(web::Data::new(stub_registry(ChargeStatus::Failed)));
}

//--------------------------------------------   Payment webhook  ----------------------------------------------

fn charge_body(event: &str, cart_id: &str) -> String {
    json!({
        "event": event,
        "data": {
            "id": 302961,
            "status": if event == "charge.success" { "success" } else { "failed" },
            "reference": "mko-ps-testref01",
            "amount": 5500,
            "currency": "GHS",
            "gateway_response": "Approved",
            "channel": "card",
            "metadata": { "cart_id": cart_id },
            "customer": { "email": "ama@example.com" }
        }
    })
    .to_string()
}

#[actix_web::test]
async fn webhook_with_missing_signature_is_400() {
    let _ = env_logger::try_init();
    let body = charge_body("charge.success", "cart-1");
    let (status, _) = post_raw("/payments/paystack/webhook", body, vec![], configure_webhook_fresh_cart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_with_tampered_signature_is_400_and_creates_nothing() {
    let _ = env_logger::try_init();
    let body = charge_body("charge.success", "cart-1");
    let forged = sign_payload("sk_test_someone_elses_key", body.as_bytes());
    let headers = vec![(PAYSTACK_SIGNATURE_HEADER, forged)];
    // The mock store would panic on any unexpected call, so a 400 here also proves that
    // nothing downstream of the signature check ran.
    let (status, _) = post_raw("/payments/paystack/webhook", body, headers, configure_webhook_no_store_calls).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_charge_success_materializes_the_order() {
    let _ = env_logger::try_init();
    let body = charge_body("charge.success", "cart-1");
    let signature = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let headers = vec![(PAYSTACK_SIGNATURE_HEADER, signature)];
    let (status, response) =
        post_raw("/payments/paystack/webhook", body, headers, configure_webhook_fresh_cart).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("\"success\":true"));
    assert!(response.contains("mko-order001"));
}

/// A valid signature is acknowledged with a 200 even when downstream reconciliation fails;
/// retrying an unreconcilable delivery can never make it reconcilable.
#[actix_web::test]
async fn webhook_with_valid_signature_is_200_even_when_reconciliation_fails() {
    let _ = env_logger::try_init();
    let body = charge_body("charge.success", "cart-gone");
    let signature = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let headers = vec![(PAYSTACK_SIGNATURE_HEADER, signature)];
    let (status, response) =
        post_raw("/payments/paystack/webhook", body, headers, configure_webhook_nothing_matches).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("\"success\":false"));
}

#[actix_web::test]
async fn webhook_charge_failed_after_capture_changes_nothing() {
    let _ = env_logger::try_init();
    let body = charge_body("charge.failed", "cart-1");
    let signature = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let headers = vec![(PAYSTACK_SIGNATURE_HEADER, signature)];
    let (status, response) =
        post_raw("/payments/paystack/webhook", body, headers, configure_webhook_captured_order).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("\"success\":true"));
}

#[actix_web::test]
async fn webhook_transfer_events_are_acknowledged_and_ignored() {
    let _ = env_logger::try_init();
    let body = json!({ "event": "transfer.success", "data": { "reference": "trf_1" } }).to_string();
    let signature = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let headers = vec![(PAYSTACK_SIGNATURE_HEADER, signature)];
    let (status, response) =
        post_raw("/payments/paystack/webhook", body, headers, configure_webhook_no_store_calls).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("transfer.success"));
}

fn configure_webhook_fresh_cart(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_cart().returning(|_| Ok(Some(cart_fixture("cart-1"))));
    store
        .expect_insert_order_once()
        .returning(|_| Ok((order_fixture("mko-order001", "cart-1", "mko-ps-testref01"), true)));
    store.expect_fetch_order_items().returning(|_| Ok(order_items_fixture("mko-order001")));
    cfg.service(PaymentWebhookRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(paystack_registry()))
        .app_data(web::Data::new(server_options()));
}

fn configure_webhook_nothing_matches(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_cart().returning(|_| Ok(None));
    store.expect_fetch_order_by_reference().returning(|_, _| Ok(None));
    cfg.service(PaymentWebhookRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(paystack_registry()))
        .app_data(web::Data::new(server_options()));
}

fn configure_webhook_captured_order(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_fetch_order_by_reference()
        .returning(|_, _| Ok(Some(order_fixture("mko-order001", "cart-1", "mko-ps-testref01"))));
    cfg.service(PaymentWebhookRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(paystack_registry()))
        .app_data(web::Data::new(server_options()));
}

fn configure_webhook_no_store_calls(cfg: &mut ServiceConfig) {
    let store = MockPaymentStore::new();
    cfg.service(PaymentWebhookRoute::<MockPaymentStore>::new())
        .app_data(web::Data::new(ReconciliationApi::new(store, EventProducers::default())))
        .app_data(web::Data::new(paystack_registry()))
        .app_data(web::Data::new(server_options()));
}
