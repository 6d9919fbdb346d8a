use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::store::{unfurl_cache, DbPool};

/// Sweeps `unfurl_cache` rows past their 24h TTL (§3), grounded on the
/// teacher's `jobs::key_package_cleanup` interval-loop shape.
pub async fn run_unfurl_cache_cleanup_worker(pool: DbPool) {
    let mut ticker = interval(Duration::from_secs(3600));

    info!("starting unfurl cache cleanup worker (runs hourly)");

    loop {
        ticker.tick().await;

        match unfurl_cache::delete_expired(&pool).await {
            Ok(count) if count > 0 => info!(count, "cleaned up expired unfurl cache entries"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "unfurl cache cleanup failed"),
        }
    }
}
