use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{FailureKind, RelayError, RelayEvent};

/// Failure message synthesized when the sending half vanishes mid-exchange.
pub const CLOSED_WITHOUT_OUTCOME: &str = "relay channel closed before a terminal outcome";

/// Body segments buffered per request before the sender waits for the reader.
pub const REPLY_CHUNK_CAPACITY: usize = 16;

/// Creates a connected sender/reply pair for one relayed request.
#[must_use]
pub fn reply_pair() -> (RelaySender, RelayReply) {
    let (chunks_tx, chunks_rx) = mpsc::channel(REPLY_CHUNK_CAPACITY);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    (
        RelaySender {
            chunks: chunks_tx,
            outcome: outcome_tx,
        },
        RelayReply {
            chunks: Some(chunks_rx),
            outcome: Some(outcome_rx),
        },
    )
}

/// Sending half held by the privileged context.
///
/// Terminal methods take `self`, so a second terminal outcome cannot be sent.
/// Chunks travel through a bounded queue; the terminal outcome travels
/// separately and is observed only after every queued chunk.
#[derive(Debug)]
pub struct RelaySender {
    chunks: mpsc::Sender<Vec<u8>>,
    outcome: oneshot::Sender<RelayEvent>,
}

impl RelaySender {
    /// Forwards one body segment, waiting while the reader is
    /// [`REPLY_CHUNK_CAPACITY`] segments behind. Returns false once the caller
    /// has gone away.
    pub async fn chunk(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.chunks.send(bytes.into()).await.is_ok()
    }

    /// Signals the end of a streamed body.
    pub fn done(self) {
        self.terminal(RelayEvent::Done);
    }

    /// Resolves an atomic exchange with its decoded payload.
    pub fn succeed(self, data: Value) {
        self.terminal(RelayEvent::Success(data));
    }

    pub fn fail(self, kind: FailureKind, message: impl Into<String>) {
        self.terminal(RelayEvent::Failure {
            kind,
            message: message.into(),
        });
    }

    /// Returns true when the reply half has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.chunks.is_closed()
    }

    fn terminal(self, event: RelayEvent) {
        // A dropped reply is not an error for the sender.
        let _ = self.outcome.send(event);
    }
}

/// Receiving half held by the UI context.
#[derive(Debug)]
pub struct RelayReply {
    chunks: Option<mpsc::Receiver<Vec<u8>>>,
    outcome: Option<oneshot::Receiver<RelayEvent>>,
}

impl RelayReply {
    /// Returns a reply that is already resolved with a failure.
    #[must_use]
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        let (sender, reply) = reply_pair();
        sender.fail(kind, message);
        reply
    }

    /// Waits for the next event.
    ///
    /// Yields exactly one terminal event and `None` afterwards. A sender dropped
    /// before its terminal call is reported as a transport failure.
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        if let Some(chunks) = self.chunks.as_mut() {
            if let Some(bytes) = chunks.recv().await {
                return Some(RelayEvent::Chunk(bytes));
            }
            self.chunks = None;
        }

        let outcome = self.outcome.take()?;
        Some(outcome.await.unwrap_or_else(|_| RelayEvent::Failure {
            kind: FailureKind::Transport,
            message: CLOSED_WITHOUT_OUTCOME.to_string(),
        }))
    }

    /// Returns true once the terminal event has been observed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outcome.is_none()
    }

    /// Resolves an atomic exchange.
    ///
    /// A streamed body is accepted as well and parsed as JSON once complete.
    pub async fn into_json(mut self) -> Result<Value, RelayError> {
        let mut body = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                RelayEvent::Chunk(bytes) => body.extend_from_slice(&bytes),
                RelayEvent::Success(data) => return Ok(data),
                RelayEvent::Done => {
                    return serde_json::from_slice(&body).map_err(|error| {
                        RelayError::UnexpectedReply(format!("streamed body is not JSON: {error}"))
                    });
                }
                RelayEvent::Failure { kind, message } => {
                    return Err(RelayError::from_failure(kind, message))
                }
            }
        }

        Err(RelayError::Transport(CLOSED_WITHOUT_OUTCOME.to_string()))
    }

    /// Resolves with the assembled body text.
    ///
    /// An atomic string payload is returned as-is; other payloads as JSON text.
    pub async fn into_text(mut self) -> Result<String, RelayError> {
        let mut body = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                RelayEvent::Chunk(bytes) => body.extend_from_slice(&bytes),
                RelayEvent::Done => return Ok(String::from_utf8_lossy(&body).into_owned()),
                RelayEvent::Success(Value::String(text)) => return Ok(text),
                RelayEvent::Success(data) => return Ok(data.to_string()),
                RelayEvent::Failure { kind, message } => {
                    return Err(RelayError::from_failure(kind, message))
                }
            }
        }

        Err(RelayError::Transport(CLOSED_WITHOUT_OUTCOME.to_string()))
    }

    /// Feeds each body segment to `sink` in arrival order and resolves after the
    /// terminal event. An atomic payload is delivered as a single segment.
    pub async fn for_each_chunk<F>(mut self, mut sink: F) -> Result<(), RelayError>
    where
        F: FnMut(&[u8]),
    {
        while let Some(event) = self.next_event().await {
            match event {
                RelayEvent::Chunk(bytes) => sink(&bytes),
                RelayEvent::Done => return Ok(()),
                RelayEvent::Success(Value::String(text)) => {
                    sink(text.as_bytes());
                    return Ok(());
                }
                RelayEvent::Success(data) => {
                    sink(data.to_string().as_bytes());
                    return Ok(());
                }
                RelayEvent::Failure { kind, message } => {
                    return Err(RelayError::from_failure(kind, message))
                }
            }
        }

        Err(RelayError::Transport(CLOSED_WITHOUT_OUTCOME.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{reply_pair, RelayReply, CLOSED_WITHOUT_OUTCOME, REPLY_CHUNK_CAPACITY};
    use crate::{FailureKind, RelayError, RelayEvent};

    #[tokio::test]
    async fn chunks_arrive_in_order_followed_by_single_terminal() {
        let (sender, mut reply) = reply_pair();
        assert!(sender.chunk("Hi").await);
        assert!(sender.chunk(" there").await);
        sender.done();

        assert_eq!(reply.next_event().await, Some(RelayEvent::Chunk(b"Hi".to_vec())));
        assert_eq!(
            reply.next_event().await,
            Some(RelayEvent::Chunk(b" there".to_vec()))
        );
        assert_eq!(reply.next_event().await, Some(RelayEvent::Done));
        assert!(reply.is_settled());
        assert_eq!(reply.next_event().await, None);
    }

    #[tokio::test]
    async fn dropped_sender_surfaces_exactly_one_transport_failure() {
        let (sender, mut reply) = reply_pair();
        sender.chunk("partial").await;
        drop(sender);

        assert_eq!(
            reply.next_event().await,
            Some(RelayEvent::Chunk(b"partial".to_vec()))
        );
        assert_eq!(
            reply.next_event().await,
            Some(RelayEvent::Failure {
                kind: FailureKind::Transport,
                message: CLOSED_WITHOUT_OUTCOME.to_string(),
            })
        );
        assert_eq!(reply.next_event().await, None);
    }

    #[tokio::test]
    async fn into_text_assembles_streamed_body() {
        let (sender, reply) = reply_pair();
        sender.chunk("Hello, ").await;
        sender.chunk("world").await;
        sender.done();

        assert_eq!(reply.into_text().await, Ok("Hello, world".to_string()));
    }

    #[tokio::test]
    async fn into_json_accepts_atomic_and_streamed_payloads() {
        let (sender, reply) = reply_pair();
        sender.succeed(json!({ "ok": true }));
        assert_eq!(reply.into_json().await, Ok(json!({ "ok": true })));

        let (sender, reply) = reply_pair();
        sender.chunk(r#"{"a":"#).await;
        sender.chunk("1}").await;
        sender.done();
        assert_eq!(reply.into_json().await, Ok(json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn into_json_rejects_non_json_stream() {
        let (sender, reply) = reply_pair();
        sender.chunk("plain text").await;
        sender.done();

        let error = reply.into_json().await.expect_err("plain text is not JSON");
        assert!(matches!(error, RelayError::UnexpectedReply(_)));
    }

    #[tokio::test]
    async fn for_each_chunk_reports_failure_after_partial_delivery() {
        let (sender, reply) = reply_pair();
        sender.chunk("a").await;
        sender.fail(FailureKind::Upstream, "boom");

        let mut seen = Vec::new();
        let result = reply
            .for_each_chunk(|bytes| seen.push(String::from_utf8_lossy(bytes).into_owned()))
            .await;

        assert_eq!(seen, vec!["a".to_string()]);
        assert_eq!(result, Err(RelayError::Upstream("boom".to_string())));
    }

    #[tokio::test]
    async fn for_each_chunk_delivers_atomic_string_as_single_segment() {
        let (sender, reply) = reply_pair();
        sender.succeed(json!("summary"));

        let mut seen = Vec::new();
        reply
            .for_each_chunk(|bytes| seen.push(bytes.to_vec()))
            .await
            .expect("atomic success should resolve");
        assert_eq!(seen, vec![b"summary".to_vec()]);
    }

    #[tokio::test]
    async fn failed_reply_is_pre_resolved() {
        let reply = RelayReply::failed(FailureKind::Transport, "no background");
        assert_eq!(
            reply.into_text().await,
            Err(RelayError::Transport("no background".to_string()))
        );
    }

    #[tokio::test]
    async fn sender_observes_dropped_reply() {
        let (sender, reply) = reply_pair();
        drop(reply);
        assert!(sender.is_closed());
        assert!(!sender.chunk("ignored").await);
    }

    #[tokio::test]
    async fn full_queue_holds_the_sender_until_the_reader_catches_up() {
        let (sender, mut reply) = reply_pair();
        for index in 0..REPLY_CHUNK_CAPACITY {
            assert!(sender.chunk(vec![index as u8]).await);
        }

        let blocked = tokio::select! {
            biased;
            _ = sender.chunk("overflow") => false,
            _ = tokio::task::yield_now() => true,
        };
        assert!(blocked, "a full queue must not accept another chunk");

        assert_eq!(reply.next_event().await, Some(RelayEvent::Chunk(vec![0])));
        assert!(sender.chunk("fits now").await);
    }
}
