mod legacy_status;

pub use legacy_status::payment_status_from_legacy_metadata;
