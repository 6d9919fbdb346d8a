use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::SystemTime;

use crate::firehose::dispatcher::DispatcherHandle;
use crate::store::DbPool;

/// A stalled firehose shard is worse than a slow one but not necessarily
/// fatal — workers may simply be between events on a quiet instance. Past
/// this many seconds of silence readiness flips to degraded.
const FIREHOSE_STALL_THRESHOLD_SECS: i64 = 120;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: u64,
    version: String,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    database: CheckStatus,
    memory: CheckStatus,
    firehose: FirehoseHealthStatus,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    ready: bool,
    checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    database: bool,
    firehose: bool,
}

/// Health status for the firehose dispatcher.
#[derive(Debug, Serialize)]
pub struct FirehoseHealthStatus {
    shard_count: usize,
    seconds_since_last_event: Option<i64>,
    status: CheckStatus,
}

pub async fn liveness() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

pub async fn readiness(
    State(pool): State<DbPool>,
    State(dispatcher): State<DispatcherHandle>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let db_ready = check_database(&pool).await;
    let firehose_health = check_firehose_health(&dispatcher);
    let firehose_ready = firehose_health.status != CheckStatus::Unhealthy;

    let ready = db_ready && firehose_ready;
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(ReadinessResponse {
            ready,
            checks: ReadinessChecks { database: db_ready, firehose: firehose_ready },
        }),
    )
}

pub async fn health(
    State(pool): State<DbPool>,
    State(dispatcher): State<DispatcherHandle>,
) -> (StatusCode, Json<HealthResponse>) {
    let db_status = if check_database(&pool).await { CheckStatus::Healthy } else { CheckStatus::Unhealthy };
    let firehose_health = check_firehose_health(&dispatcher);

    let overall_healthy =
        matches!(db_status, CheckStatus::Healthy) && matches!(firehose_health.status, CheckStatus::Healthy);
    let status = if overall_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let timestamp = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);

    (
        status,
        Json(HealthResponse {
            status: if overall_healthy { "healthy".to_string() } else { "unhealthy".to_string() },
            timestamp,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks { database: db_status, memory: CheckStatus::Healthy, firehose: firehose_health },
        }),
    )
}

async fn check_database(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// A dispatcher that has never seen an event (`last_event_unix_ms() == 0`)
/// is reported healthy rather than degraded — that's the normal state
/// right after startup, before the firehose connection delivers anything.
fn check_firehose_health(dispatcher: &DispatcherHandle) -> FirehoseHealthStatus {
    let last_ms = dispatcher.last_event_unix_ms();
    let seconds_since_last_event = if last_ms == 0 {
        None
    } else {
        Some((chrono::Utc::now().timestamp_millis() - last_ms) / 1000)
    };

    let status = match seconds_since_last_event {
        None => CheckStatus::Healthy,
        Some(secs) if secs < FIREHOSE_STALL_THRESHOLD_SECS => CheckStatus::Healthy,
        Some(_) => CheckStatus::Degraded,
    };

    FirehoseHealthStatus { shard_count: dispatcher.shard_count(), seconds_since_last_event, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let (status, body) = liveness().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
