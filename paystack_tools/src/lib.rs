mod api;
mod config;
mod error;
mod webhook;

mod data_objects;
mod helpers;

pub use api::PaystackApi;
pub use config::{PaystackConfig, PAYSTACK_SIGNATURE_HEADER};
pub use data_objects::{
    ApiEnvelope,
    AuthorizationData,
    CustomerData,
    HostedCheckout,
    NewTransaction,
    TransactionData,
};
pub use error::PaystackApiError;
pub use helpers::new_payment_reference;
pub use webhook::{parse_webhook, sign_payload, PaystackEvent};
