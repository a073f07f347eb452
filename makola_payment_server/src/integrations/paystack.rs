use async_trait::async_trait;
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
use paystack_tools::{
    new_payment_reference,
    parse_webhook,
    AuthorizationData,
    NewTransaction,
    PaystackApi,
    PaystackApiError,
    PaystackConfig,
    PaystackEvent,
    TransactionData,
    PAYSTACK_SIGNATURE_HEADER,
};

use crate::integrations::{CheckoutSession, PaymentProvider, ProviderError, WebhookEvent};

pub const PROVIDER_NAME: &str = "paystack";

/// Paystack behind the [`PaymentProvider`] trait. This gateway quotes amounts in minor units
/// end to end, so amounts pass through without conversion.
pub struct PaystackProvider {
    api: PaystackApi,
    webhook_secret: String,
}

impl PaystackProvider {
    pub fn new(config: PaystackConfig) -> Result<Self, ProviderError> {
        // Webhook deliveries are signed with the same secret key the REST client authenticates with.
        let webhook_secret = config.secret_key.reveal().clone();
        let api = PaystackApi::new(config).map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { api, webhook_secret })
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn signature_header(&self) -> &'static str {
        PAYSTACK_SIGNATURE_HEADER
    }

    async fn initialize(&self, cart: &Cart) -> Result<CheckoutSession, ProviderError> {
        let reference = new_payment_reference();
        let metadata = CorrelationMetadata {
            cart_id: Some(cart.cart_id.clone()),
            customer_email: Some(cart.customer_email.clone()),
            customer_name: None,
            shipping_address: cart.shipping_address.clone(),
        };
        let metadata = serde_json::to_value(&metadata).map_err(|e| ProviderError::BadPayload(e.to_string()))?;
        let new_tx = NewTransaction {
            email: cart.customer_email.clone(),
            amount: cart.total(),
            currency: cart.currency.code().to_string(),
            reference,
            callback_url: self.api.callback_url().cloned(),
            channels: None,
            metadata,
        };
        let checkout = self.api.initialize_transaction(&new_tx).await?;
        Ok(CheckoutSession {
            provider: PROVIDER_NAME.to_string(),
            authorization_url: checkout.authorization_url,
            access_code: Some(checkout.access_code),
            reference: checkout.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, ProviderError> {
        let data = self.api.verify_transaction(reference).await?;
        verified_payment_from(data)
    }

    fn parse_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError> {
        match parse_webhook(&self.webhook_secret, body, signature)? {
            PaystackEvent::ChargeSuccess(data) => Ok(WebhookEvent::ChargeSuccess(verified_payment_from(data)?)),
            PaystackEvent::ChargeFailed(data) => Ok(WebhookEvent::ChargeFailed(verified_payment_from(data)?)),
            PaystackEvent::Other { event, payload } => Ok(WebhookEvent::Ignored { event, payload }),
        }
    }
}

/// Normalizes a verification or webhook payload into the engine's payment shape.
fn verified_payment_from(data: TransactionData) -> Result<VerifiedPayment, ProviderError> {
    let currency = data
        .currency
        .parse::<Currency>()
        .map_err(|e| ProviderError::BadPayload(format!("Transaction {}: {e}", data.reference)))?;
    let mut metadata = data
        .metadata_object()
        .and_then(|meta| serde_json::from_value::<CorrelationMetadata>(meta).ok())
        .unwrap_or_default();
    if metadata.cart_id.is_none() {
        debug!("💳️ Transaction {} carries no cart id in its metadata", data.reference);
    }
    if let Some(customer) = &data.customer {
        metadata.customer_email.get_or_insert_with(|| customer.email.clone());
        if metadata.customer_name.is_none() {
            metadata.customer_name = full_name(customer.first_name.as_deref(), customer.last_name.as_deref());
        }
    }
    let card = data.authorization.as_ref().map(card_fingerprint).filter(|c| !c.is_empty());
    Ok(VerifiedPayment {
        provider: PROVIDER_NAME.to_string(),
        reference: data.reference,
        transaction_id: data.id.to_string(),
        amount: data.amount,
        currency,
        status: charge_status(&data.status),
        channel: PaymentChannel::from(data.channel.as_str()),
        paid_at: data.paid_at,
        gateway_response: data.gateway_response,
        metadata,
        card,
    })
}

fn charge_status(status: &str) -> ChargeStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "success" => ChargeStatus::Success,
        "failed" | "abandoned" | "reversed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

fn card_fingerprint(auth: &AuthorizationData) -> CardFingerprint {
    CardFingerprint { last4: auth.last4.clone(), bank: auth.bank.clone(), card_type: auth.card_type.clone() }
}

fn full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(f), None) => Some(f.to_string()),
        (None, Some(l)) => Some(l.to_string()),
        (None, None) => None,
    }
}

impl From<PaystackApiError> for ProviderError {
    fn from(e: PaystackApiError) -> Self {
        match e {
            PaystackApiError::Initialization(s) => ProviderError::Initialization(s),
            PaystackApiError::Unreachable(s) => ProviderError::Unreachable(s),
            PaystackApiError::InvalidSignature => ProviderError::InvalidSignature,
            PaystackApiError::Declined(s) => ProviderError::Rejected(s),
            PaystackApiError::QueryError { status, message } if status == 404 => ProviderError::Rejected(message),
            PaystackApiError::QueryError { status, message } => {
                ProviderError::Rejected(format!("Gateway error {status}. {message}"))
            },
            PaystackApiError::JsonError(s) | PaystackApiError::RestResponseError(s) => ProviderError::BadPayload(s),
        }
    }
}

#[cfg(test)]
mod test {
    use mps_common::MinorUnits;

    use super::*;

    fn transaction(status: &str, currency: &str) -> TransactionData {
        serde_json::from_value(serde_json::json!({
            "id": 302961,
            "status": status,
            "reference": "mko-ps-h2Vx81TqLmNe",
            "amount": 5500,
            "currency": currency,
            "gateway_response": "Approved",
            "channel": "mobile_money",
            "metadata": { "cart_id": "cart-77", "shipping_address": { "line1": "14 Oxford St", "city": "Accra" } },
            "customer": { "email": "ama@example.com", "first_name": "Ama", "last_name": "Serwaa" },
            "authorization": { "last4": "4081", "bank": "TEST BANK", "card_type": "visa" }
        }))
        .unwrap()
    }

    #[test]
    fn payload_normalizes_to_verified_payment() {
        let payment = verified_payment_from(transaction("success", "GHS")).unwrap();
        assert_eq!(payment.provider, "paystack");
        assert_eq!(payment.amount, MinorUnits::from(5500));
        assert_eq!(payment.currency, Currency::Ghs);
        assert_eq!(payment.status, ChargeStatus::Success);
        assert_eq!(payment.channel, PaymentChannel::MobileMoney);
        assert_eq!(payment.metadata.cart_id.as_ref().unwrap().as_str(), "cart-77");
        assert_eq!(payment.metadata.customer_name.as_deref(), Some("Ama Serwaa"));
        assert_eq!(payment.metadata.shipping_address.unwrap().city.as_deref(), Some("Accra"));
        let card = payment.card.unwrap();
        assert_eq!(card.last4.as_deref(), Some("4081"));
    }

    #[test]
    fn unknown_statuses_stay_pending() {
        assert_eq!(charge_status("success"), ChargeStatus::Success);
        assert_eq!(charge_status("Abandoned"), ChargeStatus::Failed);
        assert_eq!(charge_status("ongoing"), ChargeStatus::Pending);
        assert_eq!(charge_status("queued"), ChargeStatus::Pending);
    }

    #[test]
    fn unsupported_currency_is_a_bad_payload() {
        let err = verified_payment_from(transaction("success", "XTR")).unwrap_err();
        assert!(matches!(err, ProviderError::BadPayload(_)));
    }
}
