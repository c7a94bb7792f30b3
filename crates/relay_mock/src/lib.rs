//! Deterministic scripted implementation of the `relay_protocol` channel.
//!
//! This crate performs no network I/O. Each dispatched request consumes the
//! next [`Script`] in order and is recorded for later inspection, which makes
//! it suitable for contract-level tests of relay callers. Streamed and gated
//! scripts are played on a spawned task, so dispatching them requires a tokio
//! runtime.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use relay_protocol::{reply_pair, FailureKind, RelayChannel, RelayReply, RelayRequest, RelaySender};
use serde_json::Value;
use tokio::sync::Notify;

/// Failure message used when a request arrives with no script left.
pub const ERROR_SCRIPT_EXHAUSTED: &str = "scripted relay has no reply left";

/// Manual release point for a [`Script::Gated`] reply.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the waiting reply. Opening before the reply waits is remembered.
    pub fn open(&self) {
        self.notify.notify_one();
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Scripted answer to one relayed request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Atomic success carrying `data`.
    Json(Value),
    /// Streamed text segments followed by `done`.
    Stream(Vec<String>),
    /// Streamed raw byte segments followed by `done`.
    Bytes(Vec<Vec<u8>>),
    /// One terminal failure.
    Fail(FailureKind, String),
    /// Streamed segments, then the sender is dropped without a terminal outcome.
    Abandon(Vec<String>),
    /// Waits for the gate before playing the inner script.
    Gated(Gate, Box<Script>),
}

impl Script {
    pub fn stream<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream(chunks.into_iter().map(Into::into).collect())
    }

    pub fn fail(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Fail(kind, message.into())
    }

    #[must_use]
    pub fn gated(self, gate: &Gate) -> Self {
        Self::Gated(gate.clone(), Box::new(self))
    }
}

#[derive(Debug)]
struct ScriptState {
    scripts: VecDeque<Script>,
    requests: Vec<RelayRequest>,
}

/// Relay channel answering requests from a fixed script queue.
#[derive(Debug)]
pub struct ScriptedRelay {
    state: Mutex<ScriptState>,
    available: bool,
}

impl ScriptedRelay {
    #[must_use]
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                scripts: scripts.into_iter().collect(),
                requests: Vec::new(),
            }),
            available: true,
        }
    }

    /// Creates a channel that reports no attached privileged context.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn push(&self, script: Script) {
        lock_unpoisoned(&self.state).scripts.push_back(script);
    }

    /// Returns every dispatched request in dispatch order.
    #[must_use]
    pub fn requests(&self) -> Vec<RelayRequest> {
        lock_unpoisoned(&self.state).requests.clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        lock_unpoisoned(&self.state).requests.len()
    }

    /// Returns the JSON body of the `index`-th request, when it carried one.
    #[must_use]
    pub fn request_body(&self, index: usize) -> Option<Value> {
        let state = lock_unpoisoned(&self.state);
        let body = state.requests.get(index)?.options.body.as_deref()?;
        serde_json::from_str(body).ok()
    }
}

impl RelayChannel for ScriptedRelay {
    fn is_available(&self) -> bool {
        self.available
    }

    fn dispatch(&self, request: RelayRequest) -> RelayReply {
        let script = {
            let mut state = lock_unpoisoned(&self.state);
            state.requests.push(request);
            state.scripts.pop_front()
        };

        let (sender, reply) = reply_pair();
        match script {
            None => sender.fail(FailureKind::Transport, ERROR_SCRIPT_EXHAUSTED),
            Some(Script::Json(data)) => sender.succeed(data),
            Some(Script::Fail(kind, message)) => sender.fail(kind, message),
            Some(script) => {
                tokio::spawn(play(script, sender));
            }
        }
        reply
    }
}

async fn play(script: Script, sender: RelaySender) {
    let (gate, script) = ungate(script);
    if let Some(gate) = gate {
        gate.wait().await;
    }

    match script {
        Script::Json(data) => sender.succeed(data),
        Script::Stream(chunks) => {
            for chunk in chunks {
                sender.chunk(chunk).await;
            }
            sender.done();
        }
        Script::Bytes(chunks) => {
            for chunk in chunks {
                sender.chunk(chunk).await;
            }
            sender.done();
        }
        Script::Fail(kind, message) => sender.fail(kind, message),
        Script::Abandon(chunks) => {
            for chunk in chunks {
                sender.chunk(chunk).await;
            }
            drop(sender);
        }
        // Removed by `ungate`.
        Script::Gated(..) => {}
    }
}

/// Strips every gate layer, keeping the outermost gate. Nested gates collapse into it.
fn ungate(script: Script) -> (Option<Gate>, Script) {
    let mut outer = None;
    let mut script = script;
    while let Script::Gated(gate, inner) = script {
        outer.get_or_insert(gate);
        script = *inner;
    }
    (outer, script)
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use relay_protocol::{
        FailureKind, RelayChannel, RelayError, RelayEvent, RelayRequest, CLOSED_WITHOUT_OUTCOME,
        REPLY_CHUNK_CAPACITY,
    };
    use serde_json::json;

    use super::*;

    fn request(path: &str) -> RelayRequest {
        RelayRequest::post_json(format!("http://mock{path}"), &json!({ "path": path }), true)
    }

    #[tokio::test]
    async fn scripts_are_consumed_in_dispatch_order() {
        let relay = ScriptedRelay::new(vec![
            Script::stream(["a", "b"]),
            Script::Json(json!({ "result": "ok" })),
        ]);

        assert_eq!(relay.dispatch(request("/one")).into_text().await, Ok("ab".to_string()));
        assert_eq!(
            relay.dispatch(request("/two")).into_json().await,
            Ok(json!({ "result": "ok" }))
        );
        assert_eq!(relay.request_count(), 2);
        assert_eq!(relay.request_body(1), Some(json!({ "path": "/two" })));
    }

    #[tokio::test]
    async fn exhausted_script_fails_with_transport_error() {
        let relay = ScriptedRelay::new(Vec::new());
        assert_eq!(
            relay.dispatch(request("/x")).into_text().await,
            Err(RelayError::Transport(ERROR_SCRIPT_EXHAUSTED.to_string()))
        );
    }

    #[tokio::test]
    async fn abandoned_stream_surfaces_closed_channel_failure() {
        let relay = ScriptedRelay::new(vec![Script::Abandon(vec!["half".to_string()])]);
        let mut reply = relay.dispatch(request("/chat"));

        assert_eq!(reply.next_event().await, Some(RelayEvent::Chunk(b"half".to_vec())));
        assert_eq!(
            reply.next_event().await,
            Some(RelayEvent::Failure {
                kind: FailureKind::Transport,
                message: CLOSED_WITHOUT_OUTCOME.to_string(),
            })
        );
    }

    #[tokio::test]
    async fn gated_reply_waits_for_release() {
        let gate = Gate::new();
        let relay = ScriptedRelay::new(vec![Script::stream(["late"]).gated(&gate)]);
        let reply = relay.dispatch(request("/chat"));

        let pending = tokio::spawn(reply.into_text());
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        gate.open();
        let text = pending.await.expect("join");
        assert_eq!(text, Ok("late".to_string()));
    }

    #[tokio::test]
    async fn long_stream_is_delivered_past_the_reply_queue_capacity() {
        let chunks: Vec<String> = (0..REPLY_CHUNK_CAPACITY * 3).map(|i| i.to_string()).collect();
        let relay = ScriptedRelay::new(vec![Script::stream(chunks.clone())]);

        assert_eq!(relay.dispatch(request("/chat")).into_text().await, Ok(chunks.concat()));
    }

    #[test]
    fn unavailable_relay_reports_no_privileged_context() {
        assert!(!ScriptedRelay::unavailable().is_available());
        assert!(ScriptedRelay::new(Vec::new()).is_available());
    }
}
