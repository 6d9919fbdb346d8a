use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::store::{identity_cache, DbPool};

/// Sweeps `identity_cache` rows past their TTL backstop, grounded on the
/// teacher's `jobs::key_package_cleanup` interval-loop shape.
pub async fn run_identity_cache_cleanup_worker(pool: DbPool) {
    let mut ticker = interval(Duration::from_secs(3600));

    info!("starting identity cache cleanup worker (runs hourly)");

    loop {
        ticker.tick().await;

        match identity_cache::delete_expired(&pool).await {
            Ok(count) if count > 0 => info!(count, "cleaned up expired identity cache entries"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "identity cache cleanup failed"),
        }
    }
}
