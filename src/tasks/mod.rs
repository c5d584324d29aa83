//! Background scheduled tasks.
//!
//! Call `spawn_all` once during startup.

use crate::services::SubscriptionService;

/// Spawn all background tasks. An interval of 0 disables the expiry sweep.
pub fn spawn_all(subscriptions: SubscriptionService, expiry_sweep_interval_secs: u64) {
    if expiry_sweep_interval_secs == 0 {
        log::info!("Membership expiry sweep disabled");
        return;
    }

    // 会员过期检查
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(expiry_sweep_interval_secs);
        loop {
            match subscriptions.expire_memberships().await {
                Ok(n) if n > 0 => log::info!("Expired memberships processed: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to expire memberships: {e:?}"),
            }
            tokio::time::sleep(period).await;
        }
    });
}
