use rand::{distributions::Alphanumeric, Rng};

/// A fresh transaction reference. Supplying our own reference (rather than letting the gateway
/// pick one) is what lets verification and webhook deliveries be correlated to the same cart.
pub fn new_payment_reference() -> String {
    let id: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
    format!("mko-ps-{id}")
}
