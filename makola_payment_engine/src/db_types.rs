use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::error;
use mps_common::{Currency, MinorUnits};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------       CartId        ---------------------------------------------------------
/// The storefront's identifier for a cart. Opaque to this system; it only ever travels through
/// gateway metadata and back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(transparent)]
pub struct CartId(pub String);

impl Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for CartId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl CartId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A fresh order id. Ids are generated here rather than by the storefront, so that orders
    /// materialized by racing observers cannot collide on id.
    pub fn random() -> Self {
        let id: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
        Self(format!("mko-{id}"))
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// Lifecycle of the money side of an order.
///
/// `Captured` is terminal. Once funds have been captured the status never moves again; a late
/// `charge.failed` delivery is recorded in the logs and goes nowhere else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
pub enum PaymentStatus {
    /// No successful payment is associated with the order yet.
    #[default]
    NotPaid,
    /// A charge is in flight and the gateway has not settled it either way.
    Awaiting,
    /// Funds have been captured. Terminal.
    Captured,
    /// The most recent charge attempt failed.
    Failed,
}

impl PaymentStatus {
    /// Whether moving to `next` is a legal transition. Self-transitions are not transitions.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Captured => false,
            current => *current != next,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Captured)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::NotPaid => write!(f, "NotPaid"),
            PaymentStatus::Awaiting => write!(f, "Awaiting"),
            PaymentStatus::Captured => write!(f, "Captured"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct ConversionError(String);

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotPaid" => Ok(Self::NotPaid),
            "Awaiting" => Ok(Self::Awaiting),
            "Captured" => Ok(Self::Captured),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to NotPaid");
            PaymentStatus::NotPaid
        })
    }
}

//--------------------------------------    ChargeStatus     ---------------------------------------------------------
/// The gateway's settled view of a single charge attempt. This is what verification and webhook
/// payloads carry; it is never stored directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::Success => write!(f, "success"),
            ChargeStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------   PaymentChannel    ---------------------------------------------------------
/// How the customer paid. `Other` carries whatever string the gateway reported, so an exotic
/// channel is preserved rather than flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentChannel {
    Card,
    MobileMoney,
    BankTransfer,
    Ussd,
    Other(String),
}

impl From<&str> for PaymentChannel {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "card" => Self::Card,
            "mobile_money" | "mobilemoney" | "mobilemoneygh" | "momo" => Self::MobileMoney,
            "bank" | "bank_transfer" | "banktransfer" => Self::BankTransfer,
            "ussd" => Self::Ussd,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentChannel::Card => write!(f, "card"),
            PaymentChannel::MobileMoney => write!(f, "mobile_money"),
            PaymentChannel::BankTransfer => write!(f, "bank_transfer"),
            PaymentChannel::Ussd => write!(f, "ussd"),
            PaymentChannel::Other(s) => write!(f, "{s}"),
        }
    }
}

//--------------------------------------       Address       ---------------------------------------------------------
/// A postal address snapshot. Stored on carts, copied verbatim onto orders at materialization,
/// and never rewritten afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

const PLACEHOLDER_ADDRESS_LINE: &str = "Address not provided";

impl Address {
    /// The stand-in used when no address can be resolved from any source. Orders carrying it
    /// need manual follow-up before anything ships.
    pub fn placeholder() -> Self {
        Self { name: Some("Unknown recipient".to_string()), line1: Some(PLACEHOLDER_ADDRESS_LINE.to_string()), ..Default::default() }
    }

    pub fn is_placeholder(&self) -> bool {
        self.line1.as_deref() == Some(PLACEHOLDER_ADDRESS_LINE)
    }
}

//--------------------------------------   CartLineItem      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: i64,
    pub cart_id: CartId,
    pub variant_id: String,
    pub title: String,
    pub unit_price: MinorUnits,
    pub quantity: i64,
}

impl CartLineItem {
    pub fn line_total(&self) -> MinorUnits {
        self.unit_price * self.quantity
    }
}

//--------------------------------------        Cart         ---------------------------------------------------------
/// A cart and its line items, read in a single snapshot. Totals are always derived from the
/// items, never stored, so a cart cannot disagree with itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub cart_id: CartId,
    pub customer_email: String,
    pub currency: Currency,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<CartLineItem>,
}

impl Cart {
    pub fn subtotal(&self) -> MinorUnits {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Adjustments (shipping, discounts, tax) are out of scope, so the total is the subtotal.
    pub fn total(&self) -> MinorUnits {
        self.subtotal()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//--------------------------------------      NewCart        ---------------------------------------------------------
/// A cart snapshot as handed over by the storefront checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCart {
    pub cart_id: CartId,
    pub customer_email: String,
    pub currency: Currency,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    pub items: Vec<NewCartItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCartItem {
    pub variant_id: String,
    pub title: String,
    pub unit_price: MinorUnits,
    pub quantity: i64,
}

//-------------------------------------- CorrelationMetadata ---------------------------------------------------------
/// What a gateway observation says about where it came from. Populated from the transaction
/// metadata that payment initialization embedded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationMetadata {
    #[serde(default)]
    pub cart_id: Option<CartId>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

//--------------------------------------   CardFingerprint   ---------------------------------------------------------
/// Non-sensitive card descriptors for receipts and support queries. The PAN and CVV never reach
/// this system in any form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFingerprint {
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
}

impl CardFingerprint {
    pub fn is_empty(&self) -> bool {
        self.last4.is_none() && self.bank.is_none() && self.card_type.is_none()
    }
}

//--------------------------------------   VerifiedPayment   ---------------------------------------------------------
/// A single authoritative observation of a payment, assembled from either a verification call or
/// a signature-checked webhook. Both paths produce exactly this shape, so reconciliation cannot
/// tell, and does not care, which one delivered it.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    /// Name of the gateway that settled the charge, e.g. `paystack`.
    pub provider: String,
    /// Our reference for the transaction, as supplied at initialization.
    pub reference: String,
    /// The gateway's own id for the transaction.
    pub transaction_id: String,
    pub amount: MinorUnits,
    pub currency: Currency,
    pub status: ChargeStatus,
    pub channel: PaymentChannel,
    pub paid_at: Option<DateTime<Utc>>,
    /// The gateway's human-readable disposition, e.g. `Approved`.
    pub gateway_response: String,
    pub metadata: CorrelationMetadata,
    pub card: Option<CardFingerprint>,
}

//--------------------------------------   AmountMismatch    ---------------------------------------------------------
/// Audit record written onto an order whenever the verified amount differs from the cart's
/// expected amount. A discrepancy never blocks materialization; it is recorded here and logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountMismatch {
    pub expected: MinorUnits,
    pub received: MinorUnits,
    /// `received - expected`. Positive means the customer paid more than the cart total.
    pub delta: MinorUnits,
    /// Whether the delta falls inside the configured tolerance for expected fee adjustments.
    pub within_tolerance: bool,
}

impl AmountMismatch {
    /// Compares the two amounts, returning `None` when they agree exactly.
    pub fn check(expected: MinorUnits, received: MinorUnits, tolerance: MinorUnits) -> Option<Self> {
        if expected == received {
            return None;
        }
        let delta = received - expected;
        let within_tolerance = delta.value().abs() <= tolerance.value();
        Some(Self { expected, received, delta, within_tolerance })
    }
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
/// Everything the materializer writes in its single transaction. Built by the reconciliation
/// flow; nothing else constructs orders.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub cart_id: CartId,
    pub customer_email: String,
    pub currency: Currency,
    pub subtotal: MinorUnits,
    pub total: MinorUnits,
    pub payment_status: PaymentStatus,
    pub provider: String,
    pub reference: String,
    pub transaction_id: String,
    pub channel: String,
    pub gateway_response: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub card: Option<CardFingerprint>,
    pub amount_mismatch: Option<AmountMismatch>,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub variant_id: String,
    pub title: String,
    pub unit_price: MinorUnits,
    pub quantity: i64,
}

impl From<&CartLineItem> for NewOrderItem {
    fn from(item: &CartLineItem) -> Self {
        Self {
            variant_id: item.variant_id.clone(),
            title: item.title.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// The durable result of reconciliation. Orders are append-only: after creation, only the
/// payment status may change, and only along the legal transitions.
///
/// Address, card and mismatch columns hold JSON snapshots; use the accessor methods to read
/// them as structured values.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub cart_id: CartId,
    pub customer_email: String,
    pub currency: Currency,
    pub subtotal: MinorUnits,
    pub total: MinorUnits,
    pub payment_status: PaymentStatus,
    pub provider: String,
    pub reference: String,
    pub transaction_id: String,
    pub channel: String,
    pub gateway_response: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub card: Option<String>,
    pub amount_mismatch: Option<String>,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn shipping(&self) -> Option<Address> {
        serde_json::from_str(&self.shipping_address).ok()
    }

    pub fn billing(&self) -> Option<Address> {
        self.billing_address.as_deref().and_then(|s| serde_json::from_str(s).ok())
    }

    pub fn card_fingerprint(&self) -> Option<CardFingerprint> {
        self.card.as_deref().and_then(|s| serde_json::from_str(s).ok())
    }

    pub fn mismatch(&self) -> Option<AmountMismatch> {
        self.amount_mismatch.as_deref().and_then(|s| serde_json::from_str(s).ok())
    }
}

//--------------------------------------   OrderLineItem     ---------------------------------------------------------
/// A line item snapshot on an order. Titles and prices are copied from the cart at
/// materialization; later catalogue edits cannot reach back into history.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: i64,
    pub order_id: OrderId,
    pub variant_id: String,
    pub title: String,
    pub unit_price: MinorUnits,
    pub quantity: i64,
}

impl OrderLineItem {
    pub fn line_total(&self) -> MinorUnits {
        self.unit_price * self.quantity
    }
}
