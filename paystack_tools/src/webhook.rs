use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use crate::{data_objects::TransactionData, PaystackApiError};

type HmacSha512 = Hmac<Sha512>;

/// A webhook delivery, after its signature has been validated.
///
/// Charge events carry the full transaction payload. Everything else (transfers, refunds,
/// disputes) is passed through as `Other` so the caller can log and acknowledge it.
#[derive(Debug, Clone)]
pub enum PaystackEvent {
    ChargeSuccess(TransactionData),
    ChargeFailed(TransactionData),
    Other { event: String, payload: Value },
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: Value,
}

/// Validates the signature over the raw webhook body and parses the event.
///
/// The gateway signs the body with HMAC-SHA512 under the account's secret key and sends the
/// hex-encoded digest in the signature header. The comparison runs in constant time. Any
/// signature failure must be treated as a forgery: the body is not to be parsed, let alone
/// acted on.
pub fn parse_webhook(secret_key: &str, body: &[u8], signature: &str) -> Result<PaystackEvent, PaystackApiError> {
    let sig_bytes = hex::decode(signature.trim()).map_err(|_| PaystackApiError::InvalidSignature)?;
    let mut mac = HmacSha512::new_from_slice(secret_key.as_bytes()).map_err(|_| PaystackApiError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&sig_bytes).map_err(|_| PaystackApiError::InvalidSignature)?;
    let envelope =
        serde_json::from_slice::<WebhookEnvelope>(body).map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
    trace!("Webhook event '{}' passed signature validation", envelope.event);
    match envelope.event.as_str() {
        "charge.success" => {
            let data = serde_json::from_value::<TransactionData>(envelope.data)
                .map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
            Ok(PaystackEvent::ChargeSuccess(data))
        },
        "charge.failed" => {
            let data = serde_json::from_value::<TransactionData>(envelope.data)
                .map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
            Ok(PaystackEvent::ChargeFailed(data))
        },
        _ => Ok(PaystackEvent::Other { event: envelope.event, payload: envelope.data }),
    }
}

/// Hex-encoded HMAC-SHA512 signature over `body`. This is what the gateway computes for each
/// delivery; tests use it to produce valid and tampered fixtures.
pub fn sign_payload(secret_key: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha512::new_from_slice(secret_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
