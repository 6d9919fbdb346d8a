//! The bounded, `repo_did`-sharded worker pool (§4.5). Strictly serial
//! processing within a shard preserves per-repo commit order; events for
//! different repos land on different shards and fan out freely.

use std::{
    hash::Hasher,
    sync::{atomic::{AtomicI64, Ordering}, Arc},
    time::Duration,
};

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::consumers::{self, ConsumeError, ConsumeOutcome};
use crate::store::{checkpoint, DbPool};

use super::CommitEvent;

const SHARD_QUEUE_DEPTH: usize = 256;

#[derive(Clone)]
pub struct DispatcherHandle {
    shards: Vec<mpsc::Sender<(i64, CommitEvent)>>,
    last_event_unix_ms: Arc<AtomicI64>,
}

impl DispatcherHandle {
    /// Routes `event` to the shard `hash(repo_did) % shard_count`, so
    /// events from the same repo always land on the same worker and are
    /// processed strictly in arrival order.
    pub async fn dispatch(&self, seq: i64, event: CommitEvent) -> Result<(), DispatchError> {
        let shard = shard_for(&event.repo_did, self.shards.len());
        self.shards[shard]
            .send((seq, event))
            .await
            .map_err(|_| DispatchError::ShardClosed)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Unix-epoch milliseconds of the last event any shard finished
    /// processing (successfully or rejected), `0` before the first event.
    /// Used by the readiness probe to detect a stalled firehose (§5).
    pub fn last_event_unix_ms(&self) -> i64 {
        self.last_event_unix_ms.load(Ordering::Relaxed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher shard is no longer accepting events")]
    ShardClosed,
}

fn shard_for(repo_did: &str, shard_count: usize) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hasher.write(repo_did.as_bytes());
    (hasher.finish() % shard_count as u64) as usize
}

/// Spawns `shard_count` worker tasks, each owning one mpsc receiver and
/// processing events strictly in the order they were sent.
pub fn spawn(pool: DbPool, shard_count: usize) -> DispatcherHandle {
    let last_event_unix_ms = Arc::new(AtomicI64::new(0));
    let mut shards = Vec::with_capacity(shard_count);
    for shard_id in 0..shard_count {
        let (tx, rx) = mpsc::channel(SHARD_QUEUE_DEPTH);
        let pool = pool.clone();
        let last_event_unix_ms = last_event_unix_ms.clone();
        tokio::spawn(run_shard(shard_id, pool, rx, last_event_unix_ms));
        shards.push(tx);
    }
    DispatcherHandle { shards, last_event_unix_ms }
}

async fn run_shard(
    shard_id: usize,
    pool: DbPool,
    mut rx: mpsc::Receiver<(i64, CommitEvent)>,
    last_event_unix_ms: Arc<AtomicI64>,
) {
    let shard_key = format!("shard-{shard_id}");
    while let Some((seq, event)) = rx.recv().await {
        process_one(&pool, &shard_key, seq, &event).await;
        last_event_unix_ms.store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

/// Processes a single event with retry-with-backoff on transient storage
/// errors; permanent rejections are logged with `repo_did`/`rkey` and
/// skipped without blocking the shard (§4.5, §7).
async fn process_one(pool: &DbPool, shard_key: &str, seq: i64, event: &CommitEvent) {
    let pool = pool.clone();
    let event = Arc::new(event.clone());
    let attempt = {
        let pool = pool.clone();
        let event = event.clone();
        move || {
            let pool = pool.clone();
            let event = event.clone();
            async move { consumers::dispatch(&pool, &event).await }
        }
    };

    let outcome = attempt
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(50))
                .with_max_delay(Duration::from_secs(10))
                .with_max_times(5),
        )
        .when(|e: &ConsumeError| e.is_transient())
        .await;

    metrics::counter!("firehose_events_total", 1);

    match outcome {
        Ok(ConsumeOutcome::Ignored) => {}
        Ok(_) => {
            if let Err(err) = advance_checkpoint(&pool, shard_key, seq).await {
                warn!(error = %err, shard = shard_key, seq, "failed to advance dispatcher checkpoint");
            }
        }
        Err(err) => {
            metrics::counter!("firehose_events_rejected_total", 1);
            error!(
                repo_did = %event.repo_did,
                rkey = %event.rkey,
                collection = %event.collection,
                error = %err,
                "firehose event rejected, skipping"
            );
        }
    }
}

async fn advance_checkpoint(pool: &DbPool, shard_key: &str, seq: i64) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    checkpoint::advance(&mut tx, shard_key, seq).await?;
    tx.commit().await?;
    Ok(())
}
