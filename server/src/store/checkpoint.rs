use anyhow::{Context, Result};
use sqlx::Postgres;

use super::DbPool;

/// Last successfully-committed firehose sequence number for a dispatcher
/// shard, so a restart replays only uncommitted events (§4.5).
pub async fn get_last_seq(pool: &DbPool, shard: &str) -> Result<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT last_seq FROM firehose_checkpoints WHERE shard = $1")
            .bind(shard)
            .fetch_optional(pool)
            .await
            .context("failed to fetch checkpoint")?;
    Ok(row.map(|(seq,)| seq).unwrap_or(0))
}

/// Lowest committed sequence number across all dispatcher shards, i.e. the
/// relay cursor the firehose reader can safely resume from after a restart
/// without skipping an event some shard hasn't committed yet.
pub async fn get_resume_seq(pool: &DbPool, shard_count: usize) -> Result<i64> {
    let mut min_seq = i64::MAX;
    for shard_id in 0..shard_count {
        let seq = get_last_seq(pool, &format!("shard-{shard_id}")).await?;
        min_seq = min_seq.min(seq);
    }
    Ok(if min_seq == i64::MAX { 0 } else { min_seq })
}

/// Advances the checkpoint within the same transaction as the event's
/// store mutations, so it only advances on commit (§4.5, §5 transaction
/// discipline).
pub async fn advance(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    shard: &str,
    seq: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO firehose_checkpoints (shard, last_seq, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (shard) DO UPDATE SET last_seq = EXCLUDED.last_seq, updated_at = now()
        WHERE firehose_checkpoints.last_seq < EXCLUDED.last_seq
        "#,
    )
    .bind(shard)
    .bind(seq)
    .execute(&mut **tx)
    .await
    .context("failed to advance checkpoint")?;
    Ok(())
}
