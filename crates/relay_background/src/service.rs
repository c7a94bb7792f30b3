use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{AbortHandle, JoinSet};

use relay_protocol::wire::RelayEnvelope;
use relay_protocol::{
    reply_pair, FailureKind, RelayChannel, RelayReply, RelayRequest, RelaySender, RequestId,
};

use crate::config::BackgroundConfig;
use crate::error::FetchError;
use crate::fetch::Fetcher;

/// Failure reported when a request is dispatched after the service has stopped.
pub const ERROR_SERVICE_STOPPED: &str = "background relay is not running";

struct Job {
    request: RelayRequest,
    sender: RelaySender,
}

/// Privileged background context that performs relayed requests.
pub struct BackgroundRelay;

impl BackgroundRelay {
    /// Spawns the service loop on the current tokio runtime.
    ///
    /// Each accepted request runs on its own task so its reply path stays open
    /// for the full exchange. Dropping every handle lets in-flight requests
    /// finish; [`RelayHandle::shutdown`] tears them down instead.
    pub fn spawn(config: BackgroundConfig) -> Result<RelayHandle, FetchError> {
        let fetcher = Arc::new(Fetcher::new(config)?);
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(serve(fetcher, jobs_rx));

        Ok(RelayHandle {
            jobs: jobs_tx,
            service: Arc::new(task.abort_handle()),
        })
    }
}

async fn serve(fetcher: Arc<Fetcher>, mut jobs: UnboundedReceiver<Job>) {
    let mut next_request_id: RequestId = 1;
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = jobs.recv() => {
                let Some(Job { request, sender }) = job else {
                    break;
                };
                let request_id = next_request_id;
                next_request_id += 1;

                let fetcher = Arc::clone(&fetcher);
                in_flight.spawn(async move {
                    fetcher.perform(request_id, request, sender).await;
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(error) = joined {
                    tracing::error!(error = %error, "relay request task ended abnormally");
                }
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
    tracing::debug!("background relay stopped");
}

/// UI-side handle to a running [`BackgroundRelay`].
#[derive(Debug, Clone)]
pub struct RelayHandle {
    jobs: UnboundedSender<Job>,
    service: Arc<AbortHandle>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("request", &self.request).finish()
    }
}

impl RelayHandle {
    /// Tears the background context down, aborting in-flight exchanges.
    ///
    /// Callers waiting on an aborted exchange observe one transport failure.
    pub fn shutdown(&self) {
        self.service.abort();
    }

    /// Accepts a raw extension-style message.
    ///
    /// Returns `None` for messages that are not `API_REQUEST` envelopes, which
    /// the background context ignores.
    pub fn handle_message(&self, message: Value) -> Option<RelayReply> {
        match serde_json::from_value::<RelayEnvelope>(message) {
            Ok(envelope) => Some(self.dispatch(RelayRequest::from(envelope))),
            Err(error) => {
                tracing::debug!(error = %error, "ignoring non-relay message");
                None
            }
        }
    }
}

impl RelayChannel for RelayHandle {
    fn is_available(&self) -> bool {
        !self.jobs.is_closed()
    }

    fn dispatch(&self, request: RelayRequest) -> RelayReply {
        let (sender, reply) = reply_pair();
        if let Err(rejected) = self.jobs.send(Job { request, sender }) {
            let Job { sender, .. } = rejected.0;
            sender.fail(FailureKind::Transport, ERROR_SERVICE_STOPPED);
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use relay_protocol::{RelayChannel, RelayError, RelayRequest};
    use serde_json::json;

    use super::{BackgroundRelay, ERROR_SERVICE_STOPPED};
    use crate::config::BackgroundConfig;

    #[tokio::test]
    async fn handle_message_ignores_unknown_message_types() {
        let handle = BackgroundRelay::spawn(BackgroundConfig::default()).expect("spawn");
        assert!(handle
            .handle_message(json!({ "type": "PING" }))
            .is_none());
        handle.shutdown();
    }

    #[tokio::test]
    async fn invalid_url_resolves_with_transport_failure() {
        let handle = BackgroundRelay::spawn(BackgroundConfig::default()).expect("spawn");
        let reply = handle
            .handle_message(json!({
                "type": "API_REQUEST",
                "url": "not a url",
                "options": { "method": "POST" },
                "stream": false
            }))
            .expect("API_REQUEST is accepted");

        let error = reply.into_json().await.expect_err("invalid URL must fail");
        assert!(matches!(error, RelayError::Transport(message) if message.contains("invalid URL")));
        handle.shutdown();
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_fails_once_with_stopped_message() {
        let handle = BackgroundRelay::spawn(BackgroundConfig::default()).expect("spawn");
        handle.shutdown();
        for _ in 0..64 {
            if !handle.is_available() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(!handle.is_available());
        let reply = handle.dispatch(RelayRequest::post_json("http://127.0.0.1:9/x", &json!({}), false));
        assert_eq!(
            reply.into_json().await,
            Err(RelayError::Transport(ERROR_SERVICE_STOPPED.to_string()))
        );
    }
}
