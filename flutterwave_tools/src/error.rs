use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlutterwaveApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the gateway: {0}")]
    Unreachable(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway declined the request: {0}")]
    Declined(String),
    #[error("Invalid webhook signature")]
    InvalidSignature,
}
