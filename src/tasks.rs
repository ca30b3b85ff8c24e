use crate::services::payments::PaymentService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Periodic payment-timeout sweep. At-least-once: a tick that overlaps a
/// concurrent expiry simply finds nothing left to flip.
pub fn spawn_payment_sweep(payments: Arc<PaymentService>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs, "payment timeout sweep started");
        loop {
            ticker.tick().await;
            if let Err(e) = payments.expire_stale().await {
                error!(error = %e, "payment timeout sweep failed");
            }
        }
    });
}
