use actix_web::{http::StatusCode, web, web::ServiceConfig};
use makola_payment_engine::OrderApi;

use super::{
    helpers::get_request,
    mocks::{order_fixture, order_items_fixture, MockPaymentStore},
};
use crate::routes::{OrderByIdRoute, RecentOrdersRoute};

#[actix_web::test]
async fn order_by_id_returns_the_full_order() {
    let _ = env_logger::try_init();
    let (status, body) = get_request("/orders/mko-order001", configure_orders).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("mko-order001"));
    assert!(body.contains("Kente stole"));
    assert!(body.contains("Captured"));
}

#[actix_web::test]
async fn unknown_order_is_404() {
    let _ = env_logger::try_init();
    let (status, body) = get_request("/orders/mko-nothere", configure_orders).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("does not exist"));
}

#[actix_web::test]
async fn recent_orders_lists_newest_first() {
    let _ = env_logger::try_init();
    let (status, body) = get_request("/orders", configure_recent_orders).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("mko-order002"));
    assert!(body.contains("mko-order001"));
}

/// An out-of-range limit is clamped rather than rejected.
#[actix_web::test]
async fn recent_orders_clamps_the_limit() {
    let _ = env_logger::try_init();
    let (status, _) = get_request("/orders?limit=100000", configure_recent_orders).await;
    assert_eq!(status, StatusCode::OK);
}

fn configure_orders(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_order_by_id().returning(|order_id| {
        if order_id.as_str() == "mko-order001" {
            Ok(Some(order_fixture("mko-order001", "cart-1", "mko-ps-testref01")))
        } else {
            Ok(None)
        }
    });
    store.expect_fetch_order_items().returning(|_| Ok(order_items_fixture("mko-order001")));
    cfg.service(OrderByIdRoute::<MockPaymentStore>::new()).app_data(web::Data::new(OrderApi::new(store)));
}

fn configure_recent_orders(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_recent_orders().returning(|limit| {
        assert!((1..=500).contains(&limit));
        Ok(vec![
            order_fixture("mko-order002", "cart-2", "mko-ps-testref02"),
            order_fixture("mko-order001", "cart-1", "mko-ps-testref01"),
        ])
    });
    cfg.service(RecentOrdersRoute::<MockPaymentStore>::new()).app_data(web::Data::new(OrderApi::new(store)));
}
