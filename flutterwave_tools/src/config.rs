use log::*;
use mps_common::Secret;

/// Header carrying the account's webhook hash on every delivery.
pub const FLUTTERWAVE_SIGNATURE_HEADER: &str = "verif-hash";

#[derive(Debug, Clone, Default)]
pub struct FlutterwaveConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// The secret hash configured on the account dashboard. Deliveries carry it verbatim in the
    /// `verif-hash` header.
    pub verif_hash: Secret<String>,
    pub redirect_url: Option<String>,
}

impl FlutterwaveConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MPS_FLUTTERWAVE_API_URL").unwrap_or_else(|_| {
            debug!("MPS_FLUTTERWAVE_API_URL not set, using https://api.flutterwave.com/v3");
            "https://api.flutterwave.com/v3".to_string()
        });
        let secret_key = Secret::new(std::env::var("MPS_FLUTTERWAVE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("MPS_FLUTTERWAVE_SECRET_KEY not set, using (probably useless) default");
            "FLWSECK_TEST-00000000000000".to_string()
        }));
        let verif_hash = Secret::new(std::env::var("MPS_FLUTTERWAVE_VERIF_HASH").unwrap_or_else(|_| {
            warn!("MPS_FLUTTERWAVE_VERIF_HASH not set. Webhook deliveries will be rejected.");
            String::new()
        }));
        let redirect_url = std::env::var("MPS_FLUTTERWAVE_REDIRECT_URL").ok();
        Self { api_url, secret_key, verif_hash, redirect_url }
    }
}
