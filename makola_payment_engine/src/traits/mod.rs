//! Interface contracts for payment engine storage backends.
//!
//! [`PaymentStore`] defines everything a backend must provide to support the reconciliation
//! flow: cart snapshots, atomic order materialization, order queries, status transitions and
//! cart disposal. SQLite is the backend that ships; the trait is the seam that keeps the engine
//! logic independent of it, and the seam the server's endpoint tests mock.
mod payment_store;

pub use payment_store::{PaymentStore, PaymentStoreError};
