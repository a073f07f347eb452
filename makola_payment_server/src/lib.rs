//! # Makola payment server
//! This crate hosts the HTTP surface of the Makola payment backend. It is responsible for:
//! Starting hosted checkouts against the configured payment gateways.
//! Receiving browser-redirect verification calls and asynchronous webhook deliveries.
//! Handing both to the reconciliation engine, which turns each paid cart into exactly one order.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payments/{provider}/initialize`: Starts a hosted checkout for a cart.
//! * `/payments/{provider}/verify`: Redirect-verification (GET with a query string, or POST with a JSON body).
//! * `/payments/{provider}/webhook`: Signed asynchronous gateway notifications.
//! * `/orders` and `/orders/{order_id}`: Order reads.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod mailer;
pub mod routes;
pub mod server;
pub mod sweeper;

#[cfg(test)]
mod endpoint_tests;
