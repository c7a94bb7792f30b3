mod support;

use pretty_assertions::assert_eq;
use relay_mock::{Gate, Script};
use zerotrace::{Action, ActionOutcome, IgnoreReason, Phase, TranscriptEvent};

use support::{drain, scripted, wait_for_phase};

fn chat(prompt: &str) -> Action {
    Action::Chat {
        prompt: prompt.to_string(),
    }
}

#[tokio::test]
async fn second_action_while_in_flight_is_ignored() {
    let gate = Gate::new();
    let (relay, orchestrator) = scripted(vec![Script::stream(["slow answer"]).gated(&gate)]);

    let first = orchestrator.run(chat("first"));
    let second = async {
        wait_for_phase(&orchestrator, Phase::InFlight).await;
        let snapshot = orchestrator.messages();
        let outcome = orchestrator
            .run(Action::WebSearch {
                query: "second".to_string(),
            })
            .await;
        assert_eq!(orchestrator.messages(), snapshot);
        gate.open();
        outcome
    };

    let (first, second) = tokio::join!(first, second);

    assert!(matches!(first, ActionOutcome::Completed { .. }));
    assert_eq!(second, ActionOutcome::Ignored(IgnoreReason::Busy));
    assert_eq!(relay.request_count(), 1);
    assert_eq!(orchestrator.messages().len(), 2);
    assert_eq!(orchestrator.credits(), 99);
    assert_eq!(orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn submit_while_busy_keeps_pending_input() {
    let gate = Gate::new();
    let (_relay, orchestrator) = scripted(vec![Script::stream(["ok"]).gated(&gate)]);

    let first = orchestrator.run(chat("first"));
    let second = async {
        wait_for_phase(&orchestrator, Phase::InFlight).await;
        orchestrator.set_input("queued thought");
        let outcome = orchestrator.submit_input().await;
        gate.open();
        outcome
    };

    let (_, second) = tokio::join!(first, second);
    assert_eq!(second, ActionOutcome::Ignored(IgnoreReason::Busy));
    assert_eq!(orchestrator.input(), "queued thought");
}

#[tokio::test]
async fn phase_returns_to_idle_after_every_outcome() {
    let (_relay, orchestrator) = scripted(vec![
        Script::stream(["fine"]),
        Script::fail(relay_protocol::FailureKind::Transport, "offline"),
    ]);

    orchestrator.run(chat("one")).await;
    assert_eq!(orchestrator.phase(), Phase::Idle);
    orchestrator.run(chat("two")).await;
    assert_eq!(orchestrator.phase(), Phase::Idle);

    let outcome = orchestrator.run(chat("three")).await;
    assert!(matches!(outcome, ActionOutcome::Failed { .. }), "script exhausted: {outcome:?}");
    assert_eq!(orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn late_chunks_after_new_chat_are_discarded() {
    let gate = Gate::new();
    let (_relay, mut orchestrator) =
        scripted(vec![Script::stream(["too", " late"]).gated(&gate)]);
    let mut events = orchestrator.subscribe();

    let run = orchestrator.run(chat("question"));
    let reset = async {
        wait_for_phase(&orchestrator, Phase::InFlight).await;
        orchestrator.new_chat();
        gate.open();
    };

    let (outcome, ()) = tokio::join!(run, reset);
    let placeholder = outcome.placeholder().expect("placeholder");

    assert!(matches!(outcome, ActionOutcome::Completed { .. }));
    assert!(orchestrator.messages().is_empty());
    assert_eq!(orchestrator.message(placeholder), None);
    assert_eq!(orchestrator.phase(), Phase::Idle);

    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|event| matches!(event, TranscriptEvent::Chunk { .. })));
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, TranscriptEvent::Settled { .. }))
            .count(),
        1
    );
}
