use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use relay_background::BackgroundRelay;
use relay_protocol::RelayChannel;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use zerotrace::commands::{parse_function_call, parse_slash_command, SlashCommand, HELP_TEXT};
use zerotrace::models::{DsaProblem, UploadedFile};
use zerotrace::{
    logging, Action, ActionClient, ActionOutcome, AssistantConfig, FileContextSource, IgnoreReason,
    MessageKind, Orchestrator, TranscriptEvent,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    logging::init();
    let config = AssistantConfig::from_env().map_err(io::Error::other)?;

    let relay: Option<Arc<dyn RelayChannel>> = if config.demo {
        None
    } else {
        let handle = BackgroundRelay::spawn(config.background_config()).map_err(io::Error::other)?;
        Some(Arc::new(handle))
    };
    let client = ActionClient::new(relay, config.client_settings());

    let mut orchestrator = Orchestrator::new(client, config.credits, config.model.clone());
    if let Some(path) = &config.context_file {
        orchestrator = orchestrator.with_context_source(Arc::new(FileContextSource::new(path)));
    }
    let mut events = orchestrator.subscribe();

    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "zerotrace ({}) backend {} credits {}. /help for commands.",
        if orchestrator.client().is_demo() { "demo" } else { "live" },
        config.backend_url,
        orchestrator.credits()
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_slash_command(&line) else {
            orchestrator.set_input(line);
            let outcome = drive(&mut events, orchestrator.submit_input()).await;
            report(&orchestrator, &outcome, &mut stdout)?;
            continue;
        };

        let action = match command {
            SlashCommand::Quit => break,
            SlashCommand::Help => {
                writeln!(stdout, "{HELP_TEXT}")?;
                continue;
            }
            SlashCommand::New => {
                orchestrator.new_chat();
                drain(&mut events);
                writeln!(stdout, "new chat started")?;
                continue;
            }
            SlashCommand::Credits => {
                writeln!(stdout, "credits: {}", orchestrator.credits())?;
                continue;
            }
            SlashCommand::Mode(mode) => {
                orchestrator.set_mode(mode);
                writeln!(stdout, "mode: {}", mode.as_str())?;
                continue;
            }
            SlashCommand::Model(model) => {
                writeln!(stdout, "model: {model}")?;
                orchestrator.set_model(model);
                continue;
            }
            SlashCommand::Usage(usage) => {
                writeln!(stdout, "usage: {usage}")?;
                continue;
            }
            SlashCommand::Unknown(command) => {
                writeln!(stdout, "unknown command {command}; /help lists commands")?;
                continue;
            }
            SlashCommand::Search(query) => Action::WebSearch { query },
            SlashCommand::Function(raw) => match parse_function_call(&raw) {
                Some(call) => Action::FunctionCall(call),
                None => continue,
            },
            SlashCommand::Image(prompt) => Action::GenerateImage { prompt },
            SlashCommand::Solve {
                language,
                title,
                statement,
            } => Action::SolveProblem {
                problem: DsaProblem::new(title, statement),
                language,
            },
            SlashCommand::Complexity { language, code } => {
                Action::AnalyzeComplexity { code, language }
            }
            SlashCommand::Tests { count, description } => {
                Action::GenerateTestCases { description, count }
            }
            SlashCommand::File(path) => match read_upload(&path).await {
                Ok(file) => Action::AnalyzeFile { file },
                Err(error) => {
                    writeln!(stdout, "cannot read {}: {error}", path.display())?;
                    continue;
                }
            },
        };

        let outcome = drive(&mut events, orchestrator.run(action)).await;
        report(&orchestrator, &outcome, &mut stdout)?;
    }

    Ok(())
}

/// Awaits `action` while echoing streamed chunks. The flag reports whether any chunk was printed.
async fn drive<F>(
    events: &mut UnboundedReceiver<TranscriptEvent>,
    action: F,
) -> (ActionOutcome, bool)
where
    F: Future<Output = ActionOutcome>,
{
    tokio::pin!(action);
    let mut streamed = false;

    loop {
        tokio::select! {
            outcome = &mut action => {
                while let Ok(event) = events.try_recv() {
                    streamed |= print_event(event);
                }
                return (outcome, streamed);
            }
            Some(event) = events.recv() => {
                streamed |= print_event(event);
            }
        }
    }
}

fn print_event(event: TranscriptEvent) -> bool {
    let TranscriptEvent::Chunk { text, .. } = event else {
        return false;
    };
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{text}");
    let _ = stdout.flush();
    true
}

fn drain(events: &mut UnboundedReceiver<TranscriptEvent>) {
    while events.try_recv().is_ok() {}
}

fn report(
    orchestrator: &Orchestrator,
    (outcome, streamed): &(ActionOutcome, bool),
    stdout: &mut io::Stdout,
) -> io::Result<()> {
    match outcome {
        ActionOutcome::Ignored(IgnoreReason::Busy) => {
            writeln!(stdout, "(an action is already running)")
        }
        ActionOutcome::Ignored(IgnoreReason::EmptyInput) => Ok(()),
        ActionOutcome::Completed { placeholder } | ActionOutcome::Failed { placeholder, .. } => {
            if *streamed {
                writeln!(stdout)?;
            }
            let Some(message) = orchestrator.message(*placeholder) else {
                return Ok(());
            };
            let failed = matches!(outcome, ActionOutcome::Failed { .. });
            if !*streamed || failed {
                writeln!(stdout, "{}", message.content())?;
            }
            if let MessageKind::Image {
                image_url: Some(url),
                ..
            } = message.kind()
            {
                writeln!(stdout, "{url}")?;
            }
            writeln!(stdout, "[credits: {}]", orchestrator.credits())
        }
    }
}

async fn read_upload(path: &Path) -> io::Result<UploadedFile> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::from_bytes(name, bytes))
}
