use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PaystackConfig,
    data_objects::{ApiEnvelope, HostedCheckout, NewTransaction, TransactionData},
    PaystackApiError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val =
            HeaderValue::from_str(&bearer).map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaystackApiError::Unreachable(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::RestResponseError(e.to_string()))?;
            Err(PaystackApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Asks the gateway for a hosted checkout page for the given transaction. The customer
    /// completes payment there and is redirected back to the storefront.
    pub async fn initialize_transaction(&self, new_tx: &NewTransaction) -> Result<HostedCheckout, PaystackApiError> {
        debug!("Initializing transaction {} for {}", new_tx.reference, new_tx.email);
        let result = self
            .rest_query::<ApiEnvelope<HostedCheckout>, _>(Method::POST, "/transaction/initialize", Some(new_tx))
            .await?;
        if !result.status {
            return Err(PaystackApiError::Declined(result.message));
        }
        let checkout = result
            .data
            .ok_or_else(|| PaystackApiError::RestResponseError("Gateway response carried no data".into()))?;
        info!("Transaction {} initialized. Access code {}", checkout.reference, checkout.access_code);
        Ok(checkout)
    }

    /// Fetches the authoritative state of a transaction from the gateway.
    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionData, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction {reference}");
        let result = self.rest_query::<ApiEnvelope<TransactionData>, ()>(Method::GET, &path, None).await?;
        if !result.status {
            return Err(PaystackApiError::Declined(result.message));
        }
        let data = result
            .data
            .ok_or_else(|| PaystackApiError::RestResponseError("Gateway response carried no data".into()))?;
        info!("Transaction {reference} verified. Gateway reports status '{}'", data.status);
        Ok(data)
    }

    pub fn callback_url(&self) -> Option<&String> {
        self.config.callback_url.as_ref()
    }
}
