use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{status, message, data}` envelope wrapping every gateway response. Unlike some other
/// gateways, `status` here is the string `"success"` or `"error"`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlwEnvelope<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> FlwEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Body for `POST /payments`. This gateway quotes amounts in major units, so the amount here is
/// a major-unit figure produced by an explicit conversion at the call site.
#[derive(Debug, Clone, Serialize)]
pub struct NewCharge {
    pub tx_ref: String,
    pub amount: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub customer: FlwCustomer,
    pub meta: Value,
}

/// The `data` object returned by `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedPayment {
    pub link: String,
}

/// The `data` object returned by `GET /transactions/verify_by_reference`, and carried in charge
/// webhook events. `amount` is in major units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlwTransaction {
    pub id: u64,
    pub tx_ref: String,
    #[serde(default)]
    pub flw_ref: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub processor_response: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub customer: Option<FlwCustomer>,
    #[serde(default)]
    pub card: Option<FlwCard>,
}

impl FlwTransaction {
    pub fn meta_object(&self) -> Option<Value> {
        match &self.meta {
            Value::Object(_) => Some(self.meta.clone()),
            Value::String(s) => serde_json::from_str::<Value>(s).ok().filter(Value::is_object),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlwCustomer {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Non-sensitive card details. The PAN never appears on this path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlwCard {
    #[serde(default)]
    pub last_4digits: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default, rename = "type")]
    pub card_type: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_response_deserializes() {
        let json = r#"{
          "status": "success",
          "message": "Transaction fetched successfully",
          "data": {
            "id": 1163068,
            "tx_ref": "mko-fw-Qr8Zn2WcTpLy",
            "flw_ref": "FLW-MOCK-9e2dbd6f",
            "amount": 55.0,
            "currency": "GHS",
            "status": "successful",
            "payment_type": "mobilemoneygh",
            "created_at": "2024-08-22T10:05:21.000Z",
            "meta": { "cart_id": "c9f1e880-3f29-4b6e-9f5e-7a40d2a6f001" },
            "customer": { "email": "ama@example.com", "name": "Ama Mensah" },
            "card": { "last_4digits": "4081", "issuer": "TEST BANK", "type": "VISA" }
          }
        }"#;
        let envelope: FlwEnvelope<FlwTransaction> = serde_json::from_str(json).unwrap();
        assert!(envelope.is_success());
        let data = envelope.data.unwrap();
        assert_eq!(data.amount, 55.0);
        assert_eq!(data.meta_object().unwrap()["cart_id"], "c9f1e880-3f29-4b6e-9f5e-7a40d2a6f001");
        assert_eq!(data.card.unwrap().card_type.as_deref(), Some("VISA"));
    }
}
