//! Relay WebSocket reader (§4.5). Connects to `com.atproto.sync.subscribeRepos`,
//! decodes each frame and hands the resulting `CommitEvent` to the
//! dispatcher. Grounded on the teacher's `federation::upstream` reconnect
//! loop — same shape (exponential backoff via `tokio::select!` against a
//! `CancellationToken`, `tokio_tungstenite::connect_async` raced against a
//! connect timeout, a CBOR header-then-payload frame parse) generalized from
//! "one connection per (sequencer_did, convo_id) fanned out over a broadcast
//! channel" to "one connection to the configured relay fed straight into the
//! `repo_did`-sharded dispatcher."

use std::io::Cursor;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::store::{checkpoint, DbPool};

use super::decode::decode_commit;
use super::dispatcher::DispatcherHandle;
use super::FirehoseFrame;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(60);
const SUBSCRIBE_METHOD: &str = "com.atproto.sync.subscribeRepos";

#[derive(Debug, Deserialize)]
struct WireHeader {
    #[allow(dead_code)]
    op: i8,
    #[allow(dead_code)]
    t: Option<String>,
}

pub struct IngestHandle {
    cancel: CancellationToken,
}

impl IngestHandle {
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Spawns the background reader task. `relay_url` is the bare origin
/// (`https://relay.example.com`); this rewrites the scheme to `wss`/`ws`
/// itself, matching the teacher's own URL construction.
pub fn spawn(pool: DbPool, dispatcher: DispatcherHandle, relay_url: String) -> IngestHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    tokio::spawn(reader_task(pool, dispatcher, relay_url, task_cancel));
    IngestHandle { cancel }
}

async fn reader_task(pool: DbPool, dispatcher: DispatcherHandle, relay_url: String, cancel: CancellationToken) {
    let mut backoff = RECONNECT_BASE;

    loop {
        if cancel.is_cancelled() {
            debug!("firehose reader cancelled");
            return;
        }

        let cursor = checkpoint::get_resume_seq(&pool, dispatcher.shard_count())
            .await
            .unwrap_or(0);

        match connect_and_stream(&relay_url, cursor, &dispatcher, &cancel).await {
            Ok(()) => {
                backoff = RECONNECT_BASE;
                info!(relay_url, "firehose WS cleanly closed, reconnecting");
            }
            Err(err) => {
                warn!(
                    relay_url,
                    error = %err,
                    backoff_secs = backoff.as_secs(),
                    "firehose WS error, reconnecting after backoff"
                );
            }
        }

        tokio::select! {
            _ = sleep(backoff) => {}
            _ = cancel.cancelled() => return,
        }
        backoff = (backoff * 2).min(RECONNECT_CAP);
    }
}

#[derive(Debug, thiserror::Error)]
enum IngestError {
    #[error("WS connect failed: {0}")]
    ConnectFailed(String),
    #[error("WS connect timed out")]
    ConnectTimeout,
    #[error("WS read error: {0}")]
    ReadFailed(String),
}

async fn connect_and_stream(
    relay_url: &str,
    cursor: i64,
    dispatcher: &DispatcherHandle,
    cancel: &CancellationToken,
) -> Result<(), IngestError> {
    let ws_url = format!(
        "{}/xrpc/{SUBSCRIBE_METHOD}?cursor={cursor}",
        relay_url.replacen("https://", "wss://", 1).replacen("http://", "ws://", 1),
    );

    debug!(ws_url, "connecting firehose WS");

    let connect_fut = tokio_tungstenite::connect_async(&ws_url);
    let (ws_stream, _response) = tokio::select! {
        result = connect_fut => result.map_err(|e| IngestError::ConnectFailed(e.to_string()))?,
        _ = sleep(CONNECT_TIMEOUT) => return Err(IngestError::ConnectTimeout),
        _ = cancel.cancelled() => return Ok(()),
    };

    info!(relay_url, cursor, "firehose WS connected");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Binary(data))) => {
                        if let Some((seq, frame)) = parse_frame(&data) {
                            handle_frame(dispatcher, seq, frame).await;
                        }
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if write.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("firehose relay sent close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(IngestError::ReadFailed(e.to_string())),
                    None => break,
                }
            }
            _ = cancel.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                return Ok(());
            }
        }
    }

    Ok(())
}

async fn handle_frame(dispatcher: &DispatcherHandle, seq: i64, frame: FirehoseFrame) {
    if frame.kind != super::FrameKind::Commit {
        return;
    }
    match decode_commit(frame) {
        Ok(event) => {
            if let Err(err) = dispatcher.dispatch(seq, event).await {
                error!(seq, error = %err, "dispatcher shard closed, dropping firehose event");
            }
        }
        Err(err) => {
            metrics::counter!("firehose_events_rejected_total", 1);
            warn!(seq, error = %err, "dropping malformed firehose frame");
        }
    }
}

/// Frame format: `[header_cbor][payload_cbor]` concatenated — CBOR is
/// self-delimiting so the two values decode sequentially out of one buffer.
fn parse_frame(data: &[u8]) -> Option<(i64, FirehoseFrame)> {
    let mut cursor = Cursor::new(data);
    let _header: WireHeader = match serde_ipld_dagcbor::from_reader(&mut cursor) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "failed to parse firehose frame header");
            return None;
        }
    };

    let remaining = &data[cursor.position() as usize..];
    match serde_ipld_dagcbor::from_slice::<FirehoseFrame>(remaining) {
        Ok(frame) => {
            let seq = frame.seq;
            Some((seq, frame))
        }
        Err(e) => {
            warn!(error = %e, "failed to parse firehose frame payload");
            None
        }
    }
}
