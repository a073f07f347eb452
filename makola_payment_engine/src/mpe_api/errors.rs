use thiserror::Error;

use crate::{
    db_types::{CartId, ChargeStatus},
    traits::PaymentStoreError,
};

/// Failure modes of the payment-to-order flow, in the vocabulary the HTTP layer maps onto
/// status codes. Duplicate observations are not failures and do not appear here; they resolve
/// to [`crate::ReconciledOrder::AlreadyMaterialized`].
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Cart {0} does not exist")]
    CartNotFound(CartId),
    #[error("Cart {0} has no line items")]
    EmptyCart(CartId),
    #[error("The payment observation for reference {0} carries no cart reference")]
    MissingCartReference(String),
    #[error("The gateway reports charge status '{0}' for reference {1}. There is nothing to materialize")]
    PaymentNotSuccessful(ChargeStatus, String),
    #[error("Storage error: {0}")]
    StorageError(#[from] PaymentStoreError),
}
