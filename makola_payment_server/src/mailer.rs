//! Order confirmation mailer.
//!
//! Subscribes to the engine's order-confirmed event and sends a plain-text confirmation through
//! an HTTP mail relay. Strictly best-effort: every failure path here ends in a log line and
//! nothing else. An order's fate was sealed when its transaction committed; no mail problem is
//! allowed to reach back into it.
use std::{sync::Arc, time::Duration};

use log::*;
use makola_payment_engine::{
    db_types::{Order, OrderLineItem},
    events::{EventHooks, OrderConfirmedEvent},
};
use reqwest::Client;
use serde::Serialize;

use crate::{config::MailerConfig, errors::ServerError};

const MAIL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct OrderMailer {
    config: MailerConfig,
    client: Arc<Client>,
}

#[derive(Debug, Serialize)]
struct RelayMessage {
    from: String,
    to: String,
    subject: String,
    text: String,
}

impl OrderMailer {
    pub fn new(config: MailerConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(MAIL_TIMEOUT)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Registers this mailer on the order-confirmed hook.
    pub fn attach_to(self, hooks: &mut EventHooks) {
        hooks.on_order_confirmed(move |event| {
            let mailer = self.clone();
            Box::pin(async move { mailer.send_order_confirmation(event).await })
        });
    }

    pub async fn send_order_confirmation(&self, event: OrderConfirmedEvent) {
        let order = &event.order;
        let text = render_confirmation(order, &event.items);
        let Some(api_url) = &self.config.api_url else {
            info!("✉️ Mail relay is not configured. Confirmation for order [{}]:\n{text}", order.order_id);
            return;
        };
        let message = RelayMessage {
            from: self.config.sender.clone(),
            to: order.customer_email.clone(),
            subject: format!("Your Makola Market order {}", order.order_id),
            text,
        };
        let result = self
            .client
            .post(api_url)
            .bearer_auth(self.config.api_key.reveal())
            .json(&message)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!("✉️ Confirmation for order [{}] sent to {}", order.order_id, order.customer_email);
            },
            Ok(response) => {
                warn!(
                    "✉️ Mail relay returned {} for order [{}]. The order is unaffected.",
                    response.status(),
                    order.order_id
                );
            },
            Err(e) => {
                warn!("✉️ Could not reach the mail relay for order [{}]. {e}. The order is unaffected.", order.order_id);
            },
        }
    }
}

/// Renders the plain-text confirmation body. Amounts are converted back to major units here and
/// nowhere else; this function is the display edge of the system.
fn render_confirmation(order: &Order, items: &[OrderLineItem]) -> String {
    let name = order
        .shipping()
        .and_then(|a| a.name)
        .unwrap_or_else(|| "Customer".to_string());
    let currency = order.currency;
    let mut lines = Vec::with_capacity(items.len() + 6);
    lines.push(format!("Hello {name},"));
    lines.push(String::new());
    lines.push(format!("Thank you for your order {}. Here is what we have packed for you:", order.order_id));
    lines.push(String::new());
    for item in items {
        lines.push(format!(
            "  {} x{} — {currency} {:.2}",
            item.title,
            item.quantity,
            item.line_total().in_major(currency)
        ));
    }
    lines.push(String::new());
    lines.push(format!("Total: {currency} {:.2}", order.total.in_major(currency)));
    lines.push("We will be in touch when your order ships.".to_string());
    lines.join("\n")
}
