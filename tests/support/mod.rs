#![allow(dead_code)]

use std::sync::Arc;

use relay_mock::{Script, ScriptedRelay};
use relay_protocol::RelayChannel;
use zerotrace::{ActionClient, ClientSettings, Orchestrator, Phase, TranscriptEvent};

pub const BACKEND_URL: &str = "http://localhost:3000";
pub const MODEL: &str = "gpt-3.5-turbo";

pub fn scripted(scripts: Vec<Script>) -> (Arc<ScriptedRelay>, Orchestrator) {
    scripted_with(scripts, ClientSettings::default(), 100)
}

pub fn scripted_with(
    scripts: Vec<Script>,
    settings: ClientSettings,
    credits: u64,
) -> (Arc<ScriptedRelay>, Orchestrator) {
    attach(Arc::new(ScriptedRelay::new(scripts)), settings, credits)
}

pub fn attach(
    relay: Arc<ScriptedRelay>,
    settings: ClientSettings,
    credits: u64,
) -> (Arc<ScriptedRelay>, Orchestrator) {
    let channel: Arc<dyn RelayChannel> = Arc::clone(&relay) as Arc<dyn RelayChannel>;
    let client = ActionClient::new(Some(channel), settings);
    (relay, Orchestrator::new(client, credits, MODEL))
}

/// Yields until the orchestrator reaches `phase`.
pub async fn wait_for_phase(orchestrator: &Orchestrator, phase: Phase) {
    for _ in 0..1_000 {
        if orchestrator.phase() == phase {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("orchestrator never reached {phase:?}");
}

pub fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<TranscriptEvent>) -> Vec<TranscriptEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
