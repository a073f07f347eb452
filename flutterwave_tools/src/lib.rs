mod api;
mod config;
mod error;
mod webhook;

mod data_objects;
mod helpers;

pub use api::FlutterwaveApi;
pub use config::{FlutterwaveConfig, FLUTTERWAVE_SIGNATURE_HEADER};
pub use data_objects::{FlwCard, FlwCustomer, FlwEnvelope, FlwTransaction, HostedPayment, NewCharge};
pub use error::FlutterwaveApiError;
pub use helpers::new_payment_reference;
pub use webhook::{parse_webhook, FlutterwaveEvent};
