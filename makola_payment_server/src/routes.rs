//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (gateway calls, database reads)
//! must therefore be expressed as a future so that worker threads can interleave requests.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use makola_payment_engine::{
    db_types::OrderId,
    CartApi,
    OrderApi,
    PaymentStore,
    ReconciliationApi,
};

use crate::{
    config::ServerOptions,
    data_objects::{InitializePaymentRequest, JsonResponse, RecentOrdersParams, VerifyPaymentParams},
    errors::ServerError,
    helpers::get_remote_ip,
    integrations::{PaymentProvider, ProviderError, ProviderRegistry, WebhookEvent},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//------------------------------------------   Initialize payment  ---------------------------------------------
route!(initialize_payment => Post "/payments/{provider}/initialize" impl PaymentStore);
/// Starts a hosted checkout for a cart.
///
/// The cart must exist and carry at least one line item; an empty cart is refused here, before
/// any money can move, so a cart can never be paid for and then filled differently. The cart id
/// and customer identity ride along in the gateway metadata, which is how the eventual
/// verification or webhook observation finds its way back to this cart.
pub async fn initialize_payment<B: PaymentStore>(
    path: web::Path<String>,
    body: web::Json<InitializePaymentRequest>,
    carts: web::Data<CartApi<B>>,
    registry: web::Data<ProviderRegistry>,
) -> Result<HttpResponse, ServerError> {
    let provider_name = path.into_inner();
    let cart_id = body.into_inner().cart_id;
    debug!("💻️ POST initialize payment for cart {cart_id} via {provider_name}");
    let provider = lookup_provider(&registry, &provider_name)?;
    let cart = carts
        .cart(&cart_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Cart {cart_id} does not exist")))?;
    if cart.is_empty() {
        info!("💻️ Refusing to initialize a payment for empty cart {cart_id}");
        return Err(ServerError::PaymentRejected(format!("Cart {cart_id} has no line items")));
    }
    let session = provider.initialize(&cart).await?;
    info!(
        "💻️ Checkout session {} created on {} for cart {cart_id} ({} {})",
        session.reference,
        session.provider,
        cart.currency,
        cart.total()
    );
    Ok(HttpResponse::Ok().json(session))
}

//--------------------------------------------   Verify payment  -----------------------------------------------
route!(verify_payment => Get "/payments/{provider}/verify" impl PaymentStore);
/// Browser-redirect verification. The reference arrives in the query string after the gateway
/// redirects the customer back to the storefront.
pub async fn verify_payment<B: PaymentStore>(
    path: web::Path<String>,
    query: web::Query<VerifyPaymentParams>,
    registry: web::Data<ProviderRegistry>,
    reconciliation: web::Data<ReconciliationApi<B>>,
    orders: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let provider_name = path.into_inner();
    let reference = query.into_inner().reference;
    debug!("💻️ GET verify payment {reference} via {provider_name}");
    verify_and_reconcile(&provider_name, &reference, &registry, &reconciliation, &orders).await
}

route!(submit_verify_payment => Post "/payments/{provider}/verify" impl PaymentStore);
/// Same flow as the GET form, for storefronts that post the reference instead of passing it on
/// the redirect query string.
pub async fn submit_verify_payment<B: PaymentStore>(
    path: web::Path<String>,
    body: web::Json<VerifyPaymentParams>,
    registry: web::Data<ProviderRegistry>,
    reconciliation: web::Data<ReconciliationApi<B>>,
    orders: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let provider_name = path.into_inner();
    let reference = body.into_inner().reference;
    debug!("💻️ POST verify payment {reference} via {provider_name}");
    verify_and_reconcile(&provider_name, &reference, &registry, &reconciliation, &orders).await
}

/// The shared verification flow: ask the gateway for its authoritative view of the transaction,
/// then let the reconciliation engine drive it to exactly one order.
///
/// Retrying this call with the same reference is always safe. After the first materialization
/// every retry finds the existing order, so a customer reloading the confirmation page lands on
/// the same order every time.
async fn verify_and_reconcile<B: PaymentStore>(
    provider_name: &str,
    reference: &str,
    registry: &ProviderRegistry,
    reconciliation: &ReconciliationApi<B>,
    orders: &OrderApi<B>,
) -> Result<HttpResponse, ServerError> {
    let provider = lookup_provider(registry, provider_name)?;
    let payment = provider.verify(reference).await?;
    let result = reconciliation.reconcile(&payment).await?;
    if result.was_created() {
        info!("💻️ Verification of {reference} materialized order [{}]", result.order().order_id);
    } else {
        debug!("💻️ Verification of {reference} found existing order [{}]", result.order().order_id);
    }
    let order_id = result.order().order_id.clone();
    let full = orders
        .order_by_id(&order_id)
        .await?
        .ok_or_else(|| ServerError::BackendError(format!("Order {order_id} vanished after reconciliation")))?;
    Ok(HttpResponse::Ok().json(full))
}

//--------------------------------------------   Payment webhook  ----------------------------------------------
route!(payment_webhook => Post "/payments/{provider}/webhook" impl PaymentStore);
/// Asynchronous gateway notifications.
///
/// The response contract is deliberately lopsided: a missing or invalid signature is a 400, and
/// everything after a valid signature is a 200, whatever the downstream outcome. Gateways retry
/// aggressively on non-2xx responses, and a retry of a delivery that already failed downstream
/// can never become actionable, so a 200 with a failure body is the only response that stops
/// the retry storm without lying about the signature.
pub async fn payment_webhook<B: PaymentStore>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    registry: web::Data<ProviderRegistry>,
    reconciliation: web::Data<ReconciliationApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let provider_name = path.into_inner();
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    trace!("💻️ Webhook delivery for {provider_name} from {peer:?}");
    let provider = lookup_provider(&registry, &provider_name)?;
    let signature = req
        .headers()
        .get(provider.signature_header())
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::InvalidWebhookSignature)?;
    let event = match provider.parse_webhook(&body, signature) {
        Ok(event) => event,
        Err(ProviderError::InvalidSignature) => {
            warn!("🔐️ Webhook delivery for {provider_name} from {peer:?} failed signature validation");
            return Err(ServerError::InvalidWebhookSignature);
        },
        Err(e) => {
            // Signature was fine, the payload was not. Acknowledge so the gateway stops resending it.
            warn!("💻️ Webhook delivery for {provider_name} passed signature validation but could not be used. {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure(e)));
        },
    };
    let response = handle_webhook_event(&provider_name, event, reconciliation.as_ref()).await;
    Ok(HttpResponse::Ok().json(response))
}

async fn handle_webhook_event<B: PaymentStore>(
    provider_name: &str,
    event: WebhookEvent,
    reconciliation: &ReconciliationApi<B>,
) -> JsonResponse {
    match event {
        WebhookEvent::ChargeSuccess(payment) => match reconciliation.reconcile(&payment).await {
            Ok(result) => {
                let order = result.order();
                if result.was_created() {
                    info!("💻️ Webhook charge {} materialized order [{}]", payment.reference, order.order_id);
                } else {
                    debug!("💻️ Webhook charge {} matched existing order [{}]", payment.reference, order.order_id);
                }
                JsonResponse::success(format!("Order {}", order.order_id))
            },
            Err(e) => {
                warn!("💻️ Webhook charge {} for {provider_name} could not be reconciled. {e}", payment.reference);
                JsonResponse::failure(e)
            },
        },
        WebhookEvent::ChargeFailed(payment) => match reconciliation.record_failed_charge(&payment).await {
            Ok(Some(order)) => {
                info!("💻️ Webhook failure notice moved order [{}] to {}", order.order_id, order.payment_status);
                JsonResponse::success("Failure recorded")
            },
            Ok(None) => JsonResponse::success("Failure noted"),
            Err(e) => {
                warn!("💻️ Webhook failure notice for {} could not be recorded. {e}", payment.reference);
                JsonResponse::failure(e)
            },
        },
        WebhookEvent::Ignored { event, .. } => {
            info!("💻️ Ignoring webhook event '{event}' from {provider_name}");
            JsonResponse::success(format!("Event '{event}' acknowledged"))
        },
    }
}

//------------------------------------------------   Orders  ---------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl PaymentStore);
/// Order read endpoint. The payment status served here is the stored order's single
/// authoritative field, so it reads the same whichever delivery path produced the order.
pub async fn order_by_id<B: PaymentStore>(
    path: web::Path<String>,
    orders: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let full = orders
        .order_by_id(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(full))
}

const DEFAULT_ORDER_LIMIT: i64 = 50;
const MAX_ORDER_LIMIT: i64 = 500;

route!(recent_orders => Get "/orders" impl PaymentStore);
pub async fn recent_orders<B: PaymentStore>(
    query: web::Query<RecentOrdersParams>,
    orders: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let limit = query.into_inner().limit.unwrap_or(DEFAULT_ORDER_LIMIT).clamp(1, MAX_ORDER_LIMIT);
    debug!("💻️ GET {limit} most recent orders");
    let result = orders.recent_orders(limit).await?;
    Ok(HttpResponse::Ok().json(result))
}

fn lookup_provider<'a>(
    registry: &'a ProviderRegistry,
    name: &str,
) -> Result<&'a std::sync::Arc<dyn PaymentProvider>, ServerError> {
    registry.get(name).ok_or_else(|| {
        info!("💻️ Request for unavailable payment provider '{name}'");
        ServerError::UnavailableProvider(name.to_string())
    })
}
