use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use makola_payment_engine::{PaymentStoreError, ReconciliationError};
use thiserror::Error;

use crate::integrations::ProviderError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("No payment provider named '{0}' is available on this server")]
    UnavailableProvider(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnreachable(String),
    #[error("The payment could not be accepted. {0}")]
    PaymentRejected(String),
    #[error("Webhook signature missing or invalid")]
    InvalidWebhookSignature,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PaymentRejected(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookSignature => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::UnavailableProvider(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentStoreError> for ServerError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::CartNotFound(_) | PaymentStoreError::OrderNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::CartNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconciliationError::EmptyCart(_) |
            ReconciliationError::MissingCartReference(_) |
            ReconciliationError::PaymentNotSuccessful(_, _) => Self::PaymentRejected(e.to_string()),
            ReconciliationError::StorageError(inner) => inner.into(),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unreachable(s) => Self::GatewayUnreachable(s),
            ProviderError::Rejected(s) => Self::PaymentRejected(s),
            ProviderError::InvalidSignature => Self::InvalidWebhookSignature,
            ProviderError::BadPayload(s) => Self::BackendError(s),
            ProviderError::Initialization(s) => Self::InitializeError(s),
        }
    }
}
