use std::fmt;
use std::pin::pin;

use futures_util::{Stream, StreamExt};
use relay_protocol::{FailureKind, RelaySender};

/// Totals observed while forwarding one response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub chunks: usize,
    pub bytes: usize,
}

/// Drains `body` segment by segment into `sender`, then signals `done`.
///
/// Only one segment is held at a time, and the pump waits whenever the reply
/// queue is full, so a slow reader bounds how much of the body is read ahead.
/// The body is consumed by value, so a reader can be pumped at most once and
/// is released when this returns. The
/// first read error is forwarded as a single transport failure and ends the
/// pump. When the caller drops its reply the pump stops reading early.
pub async fn pump<S, B, E>(body: S, sender: RelaySender) -> Result<PumpSummary, String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let mut body = pin!(body);
    let mut summary = PumpSummary::default();

    while let Some(segment) = body.next().await {
        match segment {
            Ok(segment) => {
                let bytes = segment.as_ref();
                if bytes.is_empty() {
                    continue;
                }

                summary.chunks += 1;
                summary.bytes += bytes.len();
                if !sender.chunk(bytes).await {
                    tracing::debug!(chunks = summary.chunks, "relay reply dropped mid-stream");
                    return Err("relay reply dropped before the stream completed".to_string());
                }
            }
            Err(error) => {
                let message = format!("stream read failed: {error}");
                sender.fail(FailureKind::Transport, message.clone());
                return Err(message);
            }
        }
    }

    sender.done();
    Ok(summary)
}
