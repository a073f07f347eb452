use async_trait::async_trait;
use flutterwave_tools::{
    new_payment_reference,
    parse_webhook,
    FlutterwaveApi,
    FlutterwaveApiError,
    FlutterwaveConfig,
    FlutterwaveEvent,
    FlwCard,
    FlwCustomer,
    FlwTransaction,
    NewCharge,
    FLUTTERWAVE_SIGNATURE_HEADER,
};
use log::*;
use makola_payment_engine::db_types::{
    CardFingerprint,
    Cart,
    ChargeStatus,
    CorrelationMetadata,
    PaymentChannel,
    VerifiedPayment,
};
use mps_common::Currency;

use crate::integrations::{CheckoutSession, PaymentProvider, ProviderError, WebhookEvent};

pub const PROVIDER_NAME: &str = "flutterwave";

/// Flutterwave behind the [`PaymentProvider`] trait.
///
/// Unlike the engine (and unlike Paystack), this gateway quotes amounts in major units, so
/// amounts are converted explicitly at this boundary, in both directions, and nowhere else.
pub struct FlutterwaveProvider {
    api: FlutterwaveApi,
}

impl FlutterwaveProvider {
    pub fn new(config: FlutterwaveConfig) -> Result<Self, ProviderError> {
        let api = FlutterwaveApi::new(config).map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { api })
    }
}

#[async_trait]
impl PaymentProvider for FlutterwaveProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn signature_header(&self) -> &'static str {
        FLUTTERWAVE_SIGNATURE_HEADER
    }

    async fn initialize(&self, cart: &Cart) -> Result<CheckoutSession, ProviderError> {
        let reference = new_payment_reference();
        let metadata = CorrelationMetadata {
            cart_id: Some(cart.cart_id.clone()),
            customer_email: Some(cart.customer_email.clone()),
            customer_name: None,
            shipping_address: cart.shipping_address.clone(),
        };
        let meta = serde_json::to_value(&metadata).map_err(|e| ProviderError::BadPayload(e.to_string()))?;
        let charge = NewCharge {
            tx_ref: reference.clone(),
            amount: cart.total().in_major(cart.currency),
            currency: cart.currency.code().to_string(),
            redirect_url: self.api.redirect_url().cloned(),
            customer: FlwCustomer { email: cart.customer_email.clone(), name: None },
            meta,
        };
        let payment = self.api.create_payment(&charge).await?;
        Ok(CheckoutSession {
            provider: PROVIDER_NAME.to_string(),
            authorization_url: payment.link,
            access_code: None,
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, ProviderError> {
        let data = self.api.verify_by_reference(reference).await?;
        verified_payment_from(data)
    }

    fn parse_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError> {
        match parse_webhook(self.api.verif_hash(), body, signature)? {
            FlutterwaveEvent::ChargeCompleted(tx) => {
                // A completed charge may still be a failed one; the payload's status decides.
                let payment = verified_payment_from(tx)?;
                if payment.status == ChargeStatus::Failed {
                    Ok(WebhookEvent::ChargeFailed(payment))
                } else {
                    Ok(WebhookEvent::ChargeSuccess(payment))
                }
            },
            FlutterwaveEvent::Other { event, payload } => Ok(WebhookEvent::Ignored { event, payload }),
        }
    }
}

/// Normalizes a verification or webhook payload into the engine's payment shape. The gateway's
/// major-unit amount becomes minor units here.
fn verified_payment_from(data: FlwTransaction) -> Result<VerifiedPayment, ProviderError> {
    let currency = data
        .currency
        .parse::<Currency>()
        .map_err(|e| ProviderError::BadPayload(format!("Transaction {}: {e}", data.tx_ref)))?;
    let amount = currency
        .minor_units(data.amount)
        .map_err(|e| ProviderError::BadPayload(format!("Transaction {}: {e}", data.tx_ref)))?;
    let mut metadata = data
        .meta_object()
        .and_then(|meta| serde_json::from_value::<CorrelationMetadata>(meta).ok())
        .unwrap_or_default();
    if metadata.cart_id.is_none() {
        debug!("💳️ Transaction {} carries no cart id in its metadata", data.tx_ref);
    }
    if let Some(customer) = &data.customer {
        metadata.customer_email.get_or_insert_with(|| customer.email.clone());
        if metadata.customer_name.is_none() {
            metadata.customer_name = customer.name.clone();
        }
    }
    let card = data.card.as_ref().map(card_fingerprint).filter(|c| !c.is_empty());
    Ok(VerifiedPayment {
        provider: PROVIDER_NAME.to_string(),
        reference: data.tx_ref,
        transaction_id: data.id.to_string(),
        amount,
        currency,
        status: charge_status(&data.status),
        channel: PaymentChannel::from(data.payment_type.as_str()),
        paid_at: data.created_at,
        gateway_response: data.processor_response.unwrap_or_default(),
        metadata,
        card,
    })
}

fn charge_status(status: &str) -> ChargeStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "successful" => ChargeStatus::Success,
        "failed" | "cancelled" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

fn card_fingerprint(card: &FlwCard) -> CardFingerprint {
    CardFingerprint { last4: card.last_4digits.clone(), bank: card.issuer.clone(), card_type: card.card_type.clone() }
}

impl From<FlutterwaveApiError> for ProviderError {
    fn from(e: FlutterwaveApiError) -> Self {
        match e {
            FlutterwaveApiError::Initialization(s) => ProviderError::Initialization(s),
            FlutterwaveApiError::Unreachable(s) => ProviderError::Unreachable(s),
            FlutterwaveApiError::InvalidSignature => ProviderError::InvalidSignature,
            FlutterwaveApiError::Declined(s) => ProviderError::Rejected(s),
            FlutterwaveApiError::QueryError { status, message } => {
                ProviderError::Rejected(format!("Gateway error {status}. {message}"))
            },
            FlutterwaveApiError::JsonError(s) | FlutterwaveApiError::RestResponseError(s) => {
                ProviderError::BadPayload(s)
            },
        }
    }
}
