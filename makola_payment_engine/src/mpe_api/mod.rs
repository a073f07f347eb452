//! # Payment engine public API
//!
//! The `mpe_api` module exposes the programmatic API of the payment engine. The API is modular:
//! clients pick the pieces they need, and different pieces can run against different backends.
//!
//! * [`cart_api`] reads and writes cart snapshots, and sweeps abandoned ones.
//! * [`reconciliation_api`] is the primary API. It drives a verified gateway payment to its
//!   terminal outcome: exactly one order, however many times the payment is observed.
//! * [`order_api`] answers order queries for the HTTP layer.
//!
//! The pattern for using the APIs is the same everywhere. An API instance is created by
//! supplying a database backend that implements [`crate::PaymentStore`]:
//!
//! ```rust,ignore
//! use makola_payment_engine::{ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/makola.db", 25).await?;
//! let api = ReconciliationApi::new(db, producers);
//! let outcome = api.reconcile(&verified_payment).await?;
//! ```

pub mod cart_api;
pub mod errors;
pub mod order_api;
pub mod order_objects;
pub mod reconciliation_api;
