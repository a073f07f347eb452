use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use makola_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CartApi,
    OrderApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::ProviderRegistry,
    mailer::OrderMailer,
    routes::{
        health,
        InitializePaymentRoute,
        OrderByIdRoute,
        PaymentWebhookRoute,
        RecentOrdersRoute,
        SubmitVerifyPaymentRoute,
        VerifyPaymentRoute,
    },
    sweeper::start_cart_sweeper,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mut hooks = EventHooks::default();
    let mailer = OrderMailer::new(config.mailer.clone())?;
    mailer.attach_to(&mut hooks);
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    info!("🚀️ Event handlers started");
    let _sweeper = start_cart_sweeper(db.clone(), config.cart_ttl);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Routes body-deserialization failures through [`ServerError`], so a malformed request body
/// gets the same JSON error envelope as every other 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let registry = ProviderRegistry::from_config(&config)?;
    info!("🚀️ {} payment provider(s) registered", registry.len());
    let options = ServerOptions::from_config(&config);
    let tolerance = config.amount_tolerance;
    let srv = HttpServer::new(move || {
        let carts = CartApi::new(db.clone());
        let reconciliation = ReconciliationApi::new(db.clone(), producers.clone()).with_tolerance(tolerance);
        let orders = OrderApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(json_config())
            .app_data(web::Data::new(carts))
            .app_data(web::Data::new(reconciliation))
            .app_data(web::Data::new(orders))
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(options))
            .service(health)
            .service(InitializePaymentRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(SubmitVerifyPaymentRoute::<SqliteDatabase>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(RecentOrdersRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
