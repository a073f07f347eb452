use log::warn;
use serde_json::Value;

use crate::db_types::PaymentStatus;

/// Maps a predecessor-era order metadata bag onto [`PaymentStatus`].
///
/// The system this one replaces kept payment state as loose keys in a JSON blob on the order.
/// Records imported from it are read through this function once, at import time; nothing in the
/// live flow writes or reads the bag format.
///
/// Keys are consulted in order of authority:
/// * `paymentStatus` (string): `captured` / `paid` / `success` mean captured, `failed` means
///   failed, `awaiting` / `pending` mean a charge was in flight.
/// * `paid` (boolean): `true` means captured.
/// * An empty or unrecognisable bag means no payment was ever recorded.
pub fn payment_status_from_legacy_metadata(metadata: &Value) -> PaymentStatus {
    let Some(bag) = metadata.as_object() else {
        return PaymentStatus::NotPaid;
    };
    if let Some(status) = bag.get("paymentStatus").and_then(Value::as_str) {
        match status.trim().to_ascii_lowercase().as_str() {
            "captured" | "paid" | "success" | "successful" => return PaymentStatus::Captured,
            "failed" | "declined" => return PaymentStatus::Failed,
            "awaiting" | "pending" | "processing" => return PaymentStatus::Awaiting,
            other => {
                warn!("Unrecognised legacy paymentStatus '{other}'. Falling through to the paid flag.");
            },
        }
    }
    match bag.get("paid").and_then(Value::as_bool) {
        Some(true) => PaymentStatus::Captured,
        _ => PaymentStatus::NotPaid,
    }
}
