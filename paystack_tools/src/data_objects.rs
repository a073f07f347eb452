use chrono::{DateTime, Utc};
use mps_common::MinorUnits;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{status, message, data}` envelope wrapping every gateway response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

/// Body for `POST /transaction/initialize`. Amounts are already in the currency's minor unit,
/// which is the scale the gateway expects.
#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub email: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
    pub metadata: Value,
}

/// The `data` object returned by `POST /transaction/initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedCheckout {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// The `data` object returned by `GET /transaction/verify/{reference}`, and carried in the
/// `data` field of charge webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    pub id: u64,
    pub status: String,
    pub reference: String,
    pub amount: MinorUnits,
    pub currency: String,
    #[serde(default)]
    pub gateway_response: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub customer: Option<CustomerData>,
    #[serde(default)]
    pub authorization: Option<AuthorizationData>,
}

impl TransactionData {
    /// The transaction metadata as a JSON object. The gateway echoes metadata back in the shape
    /// it was supplied, except that some delivery paths re-encode it as a JSON string, so both
    /// forms are accepted here.
    pub fn metadata_object(&self) -> Option<Value> {
        match &self.metadata {
            Value::Object(_) => Some(self.metadata.clone()),
            Value::String(s) => serde_json::from_str::<Value>(s).ok().filter(Value::is_object),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerData {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Non-sensitive card details from the `authorization` object. The gateway never exposes the
/// PAN or CVV, and neither does anything downstream of this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationData {
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_response_deserializes() {
        let json = r#"{
          "status": true,
          "message": "Verification successful",
          "data": {
            "id": 4099260516,
            "status": "success",
            "reference": "mko-ps-4X2aXvK9pQmT",
            "amount": 5500,
            "currency": "GHS",
            "gateway_response": "Successful",
            "paid_at": "2024-08-22T10:05:21.000Z",
            "created_at": "2024-08-22T10:03:02.000Z",
            "channel": "mobile_money",
            "metadata": { "cart_id": "c9f1e880-3f29-4b6e-9f5e-7a40d2a6f001" },
            "customer": { "email": "ama@example.com", "first_name": "Ama", "last_name": "Mensah" },
            "authorization": { "last4": "4081", "card_type": "visa", "bank": "TEST BANK" }
          }
        }"#;
        let envelope: ApiEnvelope<TransactionData> = serde_json::from_str(json).unwrap();
        assert!(envelope.status);
        let data = envelope.data.unwrap();
        assert_eq!(data.amount, MinorUnits::from(5500));
        assert_eq!(data.channel, "mobile_money");
        let meta = data.metadata_object().unwrap();
        assert_eq!(meta["cart_id"], "c9f1e880-3f29-4b6e-9f5e-7a40d2a6f001");
        assert_eq!(data.customer.unwrap().first_name.as_deref(), Some("Ama"));
    }

    #[test]
    fn string_encoded_metadata_is_recovered() {
        let json = r#"{
            "id": 1, "status": "success", "reference": "r", "amount": 100, "currency": "GHS",
            "metadata": "{\"cart_id\": \"abc\"}"
        }"#;
        let data: TransactionData = serde_json::from_str(json).unwrap();
        assert_eq!(data.metadata_object().unwrap()["cart_id"], "abc");
    }

    #[test]
    fn scalar_metadata_is_rejected() {
        let json = r#"{ "id": 1, "status": "failed", "reference": "r", "amount": 100, "currency": "GHS", "metadata": 42 }"#;
        let data: TransactionData = serde_json::from_str(json).unwrap();
        assert!(data.metadata_object().is_none());
    }
}
