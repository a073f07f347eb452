use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use crate::{data_objects::FlwTransaction, FlutterwaveApiError};

type HmacSha512 = Hmac<Sha512>;

/// A webhook delivery, after its `verif-hash` header has been validated.
///
/// Charge completion carries the transaction payload; whether the charge actually succeeded is
/// in its `status` field. Everything else passes through as `Other`.
#[derive(Debug, Clone)]
pub enum FlutterwaveEvent {
    ChargeCompleted(FlwTransaction),
    Other { event: String, payload: Value },
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: Value,
}

/// Validates the delivery header against the configured hash and parses the event.
///
/// An empty configured hash fails closed: with nothing to compare against, every delivery is
/// treated as unauthenticated.
pub fn parse_webhook(verif_hash: &str, body: &[u8], header_value: &str) -> Result<FlutterwaveEvent, FlutterwaveApiError> {
    if verif_hash.is_empty() || !hashes_match(verif_hash, header_value) {
        return Err(FlutterwaveApiError::InvalidSignature);
    }
    let envelope =
        serde_json::from_slice::<WebhookEnvelope>(body).map_err(|e| FlutterwaveApiError::JsonError(e.to_string()))?;
    trace!("Webhook event '{}' passed hash validation", envelope.event);
    match envelope.event.as_str() {
        "charge.completed" => {
            let data = serde_json::from_value::<FlwTransaction>(envelope.data)
                .map_err(|e| FlutterwaveApiError::JsonError(e.to_string()))?;
            Ok(FlutterwaveEvent::ChargeCompleted(data))
        },
        _ => Ok(FlutterwaveEvent::Other { event: envelope.event, payload: envelope.data }),
    }
}

/// Compares the configured hash to the delivered one in constant time. Both values are tagged
/// under the same fixed HMAC key and the tags compared with `verify_slice`, so the comparison
/// leaks nothing about where the first mismatching byte sits.
fn hashes_match(configured: &str, received: &str) -> bool {
    const CONTEXT: &[u8] = b"flw-verif-hash";
    let Ok(mut expected) = HmacSha512::new_from_slice(CONTEXT) else {
        return false;
    };
    expected.update(configured.as_bytes());
    let tag = expected.finalize().into_bytes();
    let Ok(mut delivered) = HmacSha512::new_from_slice(CONTEXT) else {
        return false;
    };
    delivered.update(received.as_bytes());
    delivered.verify_slice(&tag).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    const HASH: &str = "whsec-3f1c9a";

    fn charge_completed_body(status: &str) -> String {
        format!(
            r#"{{
              "event": "charge.completed",
              "data": {{
                "id": 1163068, "tx_ref": "mko-fw-Qr8Zn2WcTpLy", "amount": 55.0,
                "currency": "GHS", "status": "{status}", "payment_type": "card",
                "customer": {{ "email": "ama@example.com" }}
              }}
            }}"#
        )
    }

    #[test]
    fn matching_hash_parses_charge() {
        let body = charge_completed_body("successful");
        let event = parse_webhook(HASH, body.as_bytes(), HASH).unwrap();
        match event {
            FlutterwaveEvent::ChargeCompleted(tx) => assert_eq!(tx.status, "successful"),
            other => panic!("Expected ChargeCompleted, got {other:?}"),
        }
    }

    #[test]
    fn wrong_hash_is_rejected() {
        let body = charge_completed_body("successful");
        let err = parse_webhook(HASH, body.as_bytes(), "whsec-other").unwrap_err();
        assert!(matches!(err, FlutterwaveApiError::InvalidSignature));
    }

    #[test]
    fn near_miss_hash_is_rejected() {
        let body = charge_completed_body("successful");
        let err = parse_webhook(HASH, body.as_bytes(), "whsec-3f1c9b").unwrap_err();
        assert!(matches!(err, FlutterwaveApiError::InvalidSignature));
    }

    #[test]
    fn unconfigured_hash_fails_closed() {
        let body = charge_completed_body("successful");
        let err = parse_webhook("", body.as_bytes(), "").unwrap_err();
        assert!(matches!(err, FlutterwaveApiError::InvalidSignature));
    }

    #[test]
    fn unhandled_events_pass_through() {
        let body = r#"{ "event": "transfer.completed", "data": { "reference": "trf_9" } }"#;
        let event = parse_webhook(HASH, body.as_bytes(), HASH).unwrap();
        assert!(matches!(event, FlutterwaveEvent::Other { .. }));
    }
}
