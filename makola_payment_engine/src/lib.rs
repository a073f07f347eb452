//! Makola Payment Engine
//!
//! The engine owns the heart of the payment server: taking a verified gateway payment and
//! materializing the matching cart into exactly one immutable order, no matter how many times or
//! over which paths the payment is observed.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the
//!    data types used in the database. These are defined in the [`mod@db_types`] module and are
//!    public.
//! 2. The engine public API ([`mod@mpe_api`]). This provides the public-facing functionality:
//!    cart snapshots, the reconciliation flow, and order queries. Specific backends need to
//!    implement the [`PaymentStore`] trait in order to act as a backend for the payment server.
//!
//! The engine also provides a set of events that can be subscribed to. When a reconciliation call
//! creates an order, an [`events::OrderConfirmedEvent`] is emitted after the transaction commits.
//! A simple actor framework is used so that you can hook into these events and perform custom
//! actions, such as sending a confirmation mail.

pub mod db_types;
pub mod events;
pub mod helpers;
mod mpe_api;
mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db_url, SqliteDatabase};
pub use mpe_api::{
    cart_api::{resolve_addresses, CartApi},
    errors::ReconciliationError,
    order_api::OrderApi,
    order_objects::{FullOrder, ReconciledOrder},
    reconciliation_api::{ReconciliationApi, DEFAULT_AMOUNT_TOLERANCE},
};
pub use traits::{PaymentStore, PaymentStoreError};
