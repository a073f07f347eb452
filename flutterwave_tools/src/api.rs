use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::FlutterwaveConfig,
    data_objects::{FlwEnvelope, FlwTransaction, HostedPayment, NewCharge},
    FlutterwaveApiError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct FlutterwaveApi {
    config: FlutterwaveConfig,
    client: Arc<Client>,
}

impl FlutterwaveApi {
    pub fn new(config: FlutterwaveConfig) -> Result<Self, FlutterwaveApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val =
            HeaderValue::from_str(&bearer).map_err(|e| FlutterwaveApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FlutterwaveApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, FlutterwaveApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| FlutterwaveApiError::Unreachable(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| FlutterwaveApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message =
                response.text().await.map_err(|e| FlutterwaveApiError::RestResponseError(e.to_string()))?;
            Err(FlutterwaveApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Asks the gateway for a hosted payment page for the given charge.
    pub async fn create_payment(&self, charge: &NewCharge) -> Result<HostedPayment, FlutterwaveApiError> {
        debug!("Creating payment {} for {}", charge.tx_ref, charge.customer.email);
        let result =
            self.rest_query::<FlwEnvelope<HostedPayment>, _>(Method::POST, "/payments", &[], Some(charge)).await?;
        if !result.is_success() {
            return Err(FlutterwaveApiError::Declined(result.message));
        }
        let payment = result
            .data
            .ok_or_else(|| FlutterwaveApiError::RestResponseError("Gateway response carried no data".into()))?;
        info!("Payment {} created", charge.tx_ref);
        Ok(payment)
    }

    /// Fetches the authoritative state of a transaction by our own reference.
    pub async fn verify_by_reference(&self, tx_ref: &str) -> Result<FlwTransaction, FlutterwaveApiError> {
        debug!("Verifying transaction {tx_ref}");
        let result = self
            .rest_query::<FlwEnvelope<FlwTransaction>, ()>(
                Method::GET,
                "/transactions/verify_by_reference",
                &[("tx_ref", tx_ref)],
                None,
            )
            .await?;
        if !result.is_success() {
            return Err(FlutterwaveApiError::Declined(result.message));
        }
        let data = result
            .data
            .ok_or_else(|| FlutterwaveApiError::RestResponseError("Gateway response carried no data".into()))?;
        info!("Transaction {tx_ref} verified. Gateway reports status '{}'", data.status);
        Ok(data)
    }

    pub fn redirect_url(&self) -> Option<&String> {
        self.config.redirect_url.as_ref()
    }

    pub fn verif_hash(&self) -> &str {
        self.config.verif_hash.reveal()
    }
}
