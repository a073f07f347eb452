//! Payment gateway integrations.
//!
//! Each supported gateway implements [`PaymentProvider`], which narrows its REST and webhook
//! surface down to the three things the server needs: start a hosted checkout, verify a
//! transaction, and authenticate + parse a webhook delivery. Both paths hand the engine the
//! same [`VerifiedPayment`] shape, so reconciliation never knows which gateway, or which
//! delivery path, it is looking at.

pub mod flutterwave;
pub mod paystack;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::*;
use makola_payment_engine::db_types::{Cart, VerifiedPayment};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::ServerConfig,
    integrations::{flutterwave::FlutterwaveProvider, paystack::PaystackProvider},
};

/// What `POST /payments/{provider}/initialize` hands back to the storefront. The customer is
/// sent to `authorization_url`; `reference` is what verification and webhooks will carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub provider: String,
    pub authorization_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    pub reference: String,
}

/// A webhook delivery after signature validation, reduced to what the server acts on.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    ChargeSuccess(VerifiedPayment),
    ChargeFailed(VerifiedPayment),
    /// Transfer, refund and similar events. Logged and acknowledged, never acted on.
    Ignored { event: String, payload: Value },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Could not initialize the gateway client. {0}")]
    Initialization(String),
    #[error("The gateway could not be reached. {0}")]
    Unreachable(String),
    #[error("The gateway rejected the request. {0}")]
    Rejected(String),
    #[error("Webhook signature missing or invalid")]
    InvalidSignature,
    #[error("The gateway sent a payload we could not use. {0}")]
    BadPayload(String),
}

/// One payment gateway, seen through the only three operations the server needs.
///
/// Implementations are stateless apart from their HTTP client and are shared across workers
/// behind an `Arc`.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// The lowercase name the provider is registered and routed under, e.g. `paystack`.
    fn name(&self) -> &str;

    /// The request header the gateway uses to authenticate webhook deliveries.
    fn signature_header(&self) -> &'static str;

    /// Asks the gateway for a hosted checkout for the cart. The cart id and customer identity
    /// are embedded in the transaction metadata, which the gateway echoes back on verification
    /// and webhook deliveries; that round-trip is what lets a payment find its cart again.
    async fn initialize(&self, cart: &Cart) -> Result<CheckoutSession, ProviderError>;

    /// Fetches the gateway's authoritative state for a transaction reference.
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, ProviderError>;

    /// Authenticates a webhook delivery against `signature` and parses the event. Fails closed:
    /// an unauthenticated body is never parsed, let alone acted on.
    fn parse_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError>;
}

/// Name-keyed lookup of the configured payment providers. Built once at startup and shared by
/// every worker.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        debug!("💳️ Registered payment provider '{}'", provider.name());
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PaymentProvider>> {
        self.providers.get(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Builds the registry from the configured provider list. An unrecognised name is logged
    /// and skipped; a client that fails to construct is a hard error, since a half-configured
    /// gateway taking live traffic is worse than refusing to start.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        for name in &config.providers {
            match name.as_str() {
                "paystack" => {
                    let provider = PaystackProvider::new(config.paystack.clone())?;
                    registry.register(Arc::new(provider));
                },
                "flutterwave" => {
                    let provider = FlutterwaveProvider::new(config.flutterwave.clone())?;
                    registry.register(Arc::new(provider));
                },
                other => {
                    warn!("💳️ Unknown payment provider '{other}' in MPS_PAYMENT_PROVIDERS. Skipping it.");
                },
            }
        }
        if registry.is_empty() {
            warn!("💳️ No payment providers registered. Initialize, verify and webhook calls will all fail.");
        }
        Ok(registry)
    }
}
