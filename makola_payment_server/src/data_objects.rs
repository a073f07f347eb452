use std::fmt::Display;

use makola_payment_engine::db_types::CartId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializePaymentRequest {
    pub cart_id: CartId,
}

/// Body of `POST /payments/{provider}/verify`. The GET form carries the same reference in the
/// query string instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentParams {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentOrdersParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}
