use log::*;
use mps_common::Secret;

/// Header carrying the hex-encoded HMAC-SHA512 signature of the webhook body.
pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub callback_url: Option<String>,
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MPS_PAYSTACK_API_URL").unwrap_or_else(|_| {
            debug!("MPS_PAYSTACK_API_URL not set, using https://api.paystack.co");
            "https://api.paystack.co".to_string()
        });
        let secret_key = Secret::new(std::env::var("MPS_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("MPS_PAYSTACK_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let callback_url = std::env::var("MPS_PAYSTACK_CALLBACK_URL").ok();
        Self { api_url, secret_key, callback_url }
    }
}
