use rand::{distributions::Alphanumeric, Rng};

/// A fresh transaction reference for this gateway.
pub fn new_payment_reference() -> String {
    let id: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
    format!("mko-fw-{id}")
}
