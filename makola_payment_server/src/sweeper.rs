use chrono::Duration;
use log::*;
use makola_payment_engine::{CartApi, SqliteDatabase};
use tokio::task::JoinHandle;

const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Starts the stale-cart sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Materialization disposes of its own cart inside the order transaction; the sweeper only
/// reclaims checkouts that were abandoned and will never see a payment.
pub fn start_cart_sweeper(db: SqliteDatabase, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        let api = CartApi::new(db);
        info!("🕰️ Stale cart sweeper started. Carts untouched for {} hrs will be reclaimed.", ttl.num_hours());
        loop {
            timer.tick().await;
            debug!("🕰️ Running stale cart sweep");
            match api.purge_stale_carts(ttl).await {
                Ok(0) => debug!("🕰️ No stale carts to reclaim"),
                Ok(n) => info!("🕰️ Reclaimed {n} abandoned carts"),
                Err(e) => error!("🕰️ Error sweeping stale carts: {e}"),
            }
        }
    })
}
