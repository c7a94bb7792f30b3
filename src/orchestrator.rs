//! Single-flight action runner.
//!
//! Each accepted action walks `Idle -> Composing -> InFlight -> Settled` and
//! then returns to `Idle`. Composing appends the user message and an empty
//! assistant placeholder together; streamed chunks are appended to that
//! placeholder by id; settlement seals it exactly once, with either the result
//! or the capability's diagnostic text.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::capability::Capability;
use crate::client::{ActionClient, ActionError, AssistantMode, ChatMessage, ChatTurn};
use crate::commands::{parse_function_call, FunctionCall};
use crate::context::{ContextSource, PageContext};
use crate::credits::CreditLedger;
use crate::format;
use crate::models::{DsaProblem, UploadedFile};
use crate::transcript::{Message, MessageId, MessageKind, TextSource, Transcript, TranscriptError};

pub const SEARCH_MODEL: &str = "web-search";
pub const FUNCTION_MODEL: &str = "function-call";
pub const IMAGE_MODEL: &str = "dall-e-3";
pub const SOLVER_MODEL: &str = "dsa-solver";
pub const COMPLEXITY_MODEL: &str = "complexity-analyzer";
pub const TEST_GENERATOR_MODEL: &str = "test-generator";
pub const FILE_MODEL: &str = "file-analyzer";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Chat { prompt: String },
    WebSearch { query: String },
    FunctionCall(FunctionCall),
    GenerateImage { prompt: String },
    SolveProblem { problem: DsaProblem, language: String },
    AnalyzeComplexity { code: String, language: String },
    GenerateTestCases { description: String, count: u32 },
    AnalyzeFile { file: UploadedFile },
}

impl Action {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Chat { .. } => Capability::ChatTurn,
            Self::WebSearch { .. } => Capability::WebSearch,
            Self::FunctionCall(_) => Capability::FunctionCall,
            Self::GenerateImage { .. } => Capability::ImageGeneration,
            Self::SolveProblem { .. } => Capability::ProblemSolve,
            Self::AnalyzeComplexity { .. } => Capability::ComplexityAnalysis,
            Self::GenerateTestCases { .. } => Capability::TestCaseGeneration,
            Self::AnalyzeFile { .. } => Capability::FileAnalysis,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Self::Chat { prompt } | Self::GenerateImage { prompt } => prompt.trim().is_empty(),
            Self::WebSearch { query } => query.trim().is_empty(),
            Self::FunctionCall(call) => call.name.trim().is_empty(),
            Self::SolveProblem { problem, .. } => {
                problem.title.trim().is_empty() && problem.description.trim().is_empty()
            }
            Self::AnalyzeComplexity { code, .. } => code.trim().is_empty(),
            Self::GenerateTestCases { description, count } => {
                description.trim().is_empty() || *count == 0
            }
            Self::AnalyzeFile { file } => file.name.trim().is_empty(),
        }
    }

    fn user_content(&self) -> String {
        match self {
            Self::Chat { prompt } => prompt.clone(),
            Self::WebSearch { query } => query.clone(),
            Self::FunctionCall(call) => format!("{}({})", call.name, call.arguments),
            Self::GenerateImage { prompt } => format!("Generate image: {prompt}"),
            Self::SolveProblem { problem, language } => {
                format!("Solve in {language}: {}\n\n{}", problem.title, problem.description)
            }
            Self::AnalyzeComplexity { code, language } => {
                format!("Analyze complexity ({language}):\n{code}")
            }
            Self::GenerateTestCases { description, count } => {
                format!("Generate {count} test cases: {description}")
            }
            Self::AnalyzeFile { file } => format!("Analyze file: {}", file.name),
        }
    }

    fn placeholder_kind(&self, chat_model: &str) -> MessageKind {
        match self {
            Self::Chat { .. } => MessageKind::text(chat_model, TextSource::Chat),
            Self::WebSearch { .. } => MessageKind::text(SEARCH_MODEL, TextSource::Search),
            Self::FunctionCall(call) => MessageKind::text(
                FUNCTION_MODEL,
                TextSource::Function {
                    name: call.name.clone(),
                },
            ),
            Self::GenerateImage { .. } => MessageKind::Image {
                model: IMAGE_MODEL.to_string(),
                image_url: None,
            },
            Self::SolveProblem { .. } => MessageKind::Text {
                model: Some(SOLVER_MODEL.to_string()),
                source: None,
            },
            Self::AnalyzeComplexity { .. } => MessageKind::Text {
                model: Some(COMPLEXITY_MODEL.to_string()),
                source: None,
            },
            Self::GenerateTestCases { .. } => MessageKind::Text {
                model: Some(TEST_GENERATOR_MODEL.to_string()),
                source: None,
            },
            Self::AnalyzeFile { file } => MessageKind::File {
                model: FILE_MODEL.to_string(),
                file_name: file.name.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Composing,
    InFlight,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Another action is already in flight.
    Busy,
    EmptyInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed { placeholder: MessageId },
    Failed { placeholder: MessageId, error: ActionError },
    Ignored(IgnoreReason),
}

impl ActionOutcome {
    pub fn placeholder(&self) -> Option<MessageId> {
        match self {
            Self::Completed { placeholder } | Self::Failed { placeholder, .. } => Some(*placeholder),
            Self::Ignored(_) => None,
        }
    }
}

/// Transcript changes published to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Composed {
        user: MessageId,
        placeholder: MessageId,
        capability: Capability,
    },
    Chunk {
        placeholder: MessageId,
        text: String,
    },
    Settled {
        placeholder: MessageId,
        succeeded: bool,
    },
    Cleared,
}

struct Session {
    transcript: Transcript,
    credits: CreditLedger,
    context: PageContext,
    input: String,
    model: String,
    mode: AssistantMode,
    phase: Phase,
}

struct Composed {
    user: MessageId,
    placeholder: MessageId,
    history: Vec<ChatMessage>,
    model: String,
    mode: AssistantMode,
    context: PageContext,
}

/// How a successful result lands in the placeholder.
struct Completion {
    /// `None` keeps the streamed content.
    content: Option<String>,
    kind: Option<MessageKind>,
}

impl Completion {
    fn streamed() -> Self {
        Self {
            content: None,
            kind: None,
        }
    }

    fn replace(content: impl Into<String>, kind: Option<MessageKind>) -> Self {
        Self {
            content: Some(content.into()),
            kind,
        }
    }
}

/// Resets the phase to `Idle` when the action ends, however it ends.
struct FlightGuard<'a> {
    session: &'a Mutex<Session>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(self.session).phase = Phase::Idle;
    }
}

pub struct Orchestrator {
    client: ActionClient,
    context_source: Option<Arc<dyn ContextSource>>,
    session: Mutex<Session>,
    events: Option<mpsc::UnboundedSender<TranscriptEvent>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client)
            .field("phase", &self.phase())
            .field("credits", &self.credits())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(client: ActionClient, credits: u64, model: impl Into<String>) -> Self {
        Self {
            client,
            context_source: None,
            session: Mutex::new(Session {
                transcript: Transcript::new(),
                credits: CreditLedger::new(credits),
                context: PageContext::default(),
                input: String::new(),
                model: model.into(),
                mode: AssistantMode::default(),
                phase: Phase::Idle,
            }),
            events: None,
        }
    }

    pub fn with_context_source(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.context_source = Some(source);
        self
    }

    /// Routes transcript events to the returned receiver, replacing any previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TranscriptEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn client(&self) -> &ActionClient {
        &self.client
    }

    pub fn phase(&self) -> Phase {
        self.lock_session().phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn credits(&self) -> u64 {
        self.lock_session().credits.balance()
    }

    /// Snapshot of the transcript in insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.lock_session().transcript.messages().to_vec()
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.lock_session().transcript.get(id).cloned()
    }

    pub fn context(&self) -> PageContext {
        self.lock_session().context.clone()
    }

    pub fn input(&self) -> String {
        self.lock_session().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock_session().input = text.into();
    }

    pub fn take_input(&self) -> String {
        std::mem::take(&mut self.lock_session().input)
    }

    pub fn model(&self) -> String {
        self.lock_session().model.clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        self.lock_session().model = model.into();
    }

    pub fn mode(&self) -> AssistantMode {
        self.lock_session().mode
    }

    pub fn set_mode(&self, mode: AssistantMode) {
        self.lock_session().mode = mode;
    }

    /// Clears the transcript and pending input. Credits are kept.
    ///
    /// Chunks still arriving for a removed placeholder are discarded.
    pub fn new_chat(&self) {
        {
            let mut session = self.lock_session();
            session.transcript.clear();
            session.input.clear();
        }
        tracing::info!("started new chat");
        self.emit(TranscriptEvent::Cleared);
    }

    /// Re-reads the page context. A failing source keeps the previous context.
    pub async fn refresh_context(&self) -> PageContext {
        let Some(source) = &self.context_source else {
            return self.context();
        };

        match source.snapshot().await {
            Ok(context) => {
                self.lock_session().context = context.clone();
                context
            }
            Err(error) => {
                tracing::warn!(error = %error, "page context unavailable; keeping previous context");
                self.context()
            }
        }
    }

    /// Sends the pending input as a chat turn. The input is kept when the turn is ignored.
    pub async fn submit_input(&self) -> ActionOutcome {
        let prompt = {
            let mut session = self.lock_session();
            if session.phase != Phase::Idle {
                return ActionOutcome::Ignored(IgnoreReason::Busy);
            }
            if session.input.trim().is_empty() {
                return ActionOutcome::Ignored(IgnoreReason::EmptyInput);
            }
            session.phase = Phase::Composing;
            std::mem::take(&mut session.input)
        };

        self.run_claimed(Action::Chat { prompt }).await
    }

    /// Runs `name(args)` style input as a function call.
    pub async fn run_function_input(&self, raw: &str) -> ActionOutcome {
        match parse_function_call(raw) {
            Some(call) => self.run(Action::FunctionCall(call)).await,
            None => ActionOutcome::Ignored(IgnoreReason::EmptyInput),
        }
    }

    pub async fn run(&self, action: Action) -> ActionOutcome {
        if action.is_blank() {
            return ActionOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        {
            let mut session = self.lock_session();
            if session.phase != Phase::Idle {
                tracing::debug!(
                    capability = action.capability().name(),
                    "ignoring action while another is in flight"
                );
                return ActionOutcome::Ignored(IgnoreReason::Busy);
            }
            session.phase = Phase::Composing;
        }

        self.run_claimed(action).await
    }

    /// Runs an action whose caller has already moved the phase to `Composing`.
    async fn run_claimed(&self, action: Action) -> ActionOutcome {
        let _flight = FlightGuard {
            session: &self.session,
        };
        let capability = action.capability();

        if matches!(action, Action::Chat { .. }) {
            self.refresh_context().await;
        }

        let composed = self.compose(&action);
        self.emit(TranscriptEvent::Composed {
            user: composed.user,
            placeholder: composed.placeholder,
            capability,
        });
        tracing::info!(
            capability = capability.name(),
            message_id = %composed.placeholder,
            "action in flight"
        );

        let result = self.execute(action, &composed).await;
        self.settle(capability, composed.placeholder, result)
    }

    fn compose(&self, action: &Action) -> Composed {
        let mut session = self.lock_session();
        let model = session.model.clone();
        let user = Message::user(action.user_content());
        let placeholder = Message::placeholder(action.placeholder_kind(&model));

        let history = if matches!(action, Action::Chat { .. }) {
            session
                .transcript
                .messages()
                .iter()
                .filter(|message| !message.content().is_empty() && !message.is_failed())
                .map(|message| ChatMessage::new(message.role().as_str(), message.content()))
                .chain(std::iter::once(ChatMessage::new("user", user.content())))
                .collect()
        } else {
            Vec::new()
        };

        let (user, placeholder) = session.transcript.push_turn(user, placeholder);
        session.phase = Phase::InFlight;

        Composed {
            user,
            placeholder,
            history,
            model,
            mode: session.mode,
            context: session.context.clone(),
        }
    }

    async fn execute(&self, action: Action, composed: &Composed) -> Result<Completion, ActionError> {
        let placeholder = composed.placeholder;

        match action {
            Action::Chat { .. } => {
                let turn = ChatTurn {
                    history: &composed.history,
                    model: &composed.model,
                    mode: composed.mode,
                    context: &composed.context,
                };
                self.client
                    .send_chat(turn, |text| self.append_chunk(placeholder, text))
                    .await?;
                Ok(Completion::streamed())
            }
            Action::WebSearch { query } => {
                self.client
                    .web_search(&query, |text| self.append_chunk(placeholder, text))
                    .await?;
                Ok(Completion::streamed())
            }
            Action::FunctionCall(call) => {
                let result = self.client.call_function(&call.name, &call.arguments).await?;
                Ok(Completion::replace(result, None))
            }
            Action::GenerateImage { prompt } => {
                let image_url = self.client.generate_image(&prompt).await?;
                Ok(Completion::replace(
                    format::IMAGE_CAPTION,
                    Some(MessageKind::Image {
                        model: IMAGE_MODEL.to_string(),
                        image_url: Some(image_url),
                    }),
                ))
            }
            Action::SolveProblem { problem, language } => {
                let solution = self.client.solve_problem(&problem, &language).await?;
                let content = format::solution(&problem.title, &solution);
                Ok(Completion::replace(
                    content,
                    Some(MessageKind::Solution {
                        model: SOLVER_MODEL.to_string(),
                        difficulty: problem.difficulty,
                        category: problem.category,
                        time_complexity: solution.time_complexity,
                        space_complexity: solution.space_complexity,
                        language: solution.language,
                        test_cases: solution.test_cases,
                    }),
                ))
            }
            Action::AnalyzeComplexity { code, language } => {
                let analysis = self.client.analyze_complexity(&code, &language).await?;
                let content = format::complexity(&analysis);
                Ok(Completion::replace(
                    content,
                    Some(MessageKind::ComplexityAnalysis {
                        model: COMPLEXITY_MODEL.to_string(),
                        time_complexity: analysis.time_complexity,
                        space_complexity: analysis.space_complexity,
                    }),
                ))
            }
            Action::GenerateTestCases { description, count } => {
                let test_cases = self.client.generate_test_cases(&description, count).await?;
                Ok(Completion::replace(
                    format::test_cases(&test_cases),
                    Some(MessageKind::DsaProblem {
                        model: TEST_GENERATOR_MODEL.to_string(),
                        test_cases,
                    }),
                ))
            }
            Action::AnalyzeFile { file } => {
                let analysis = self.client.analyze_file(&file).await?;
                Ok(Completion::replace(
                    format::file_analysis(&file.name, &analysis.summary),
                    None,
                ))
            }
        }
    }

    fn append_chunk(&self, placeholder: MessageId, text: &str) {
        let appended = self.lock_session().transcript.append(placeholder, text);
        match appended {
            Ok(()) => self.emit(TranscriptEvent::Chunk {
                placeholder,
                text: text.to_string(),
            }),
            Err(error) => {
                tracing::debug!(message_id = %placeholder, error = %error, "discarding chunk");
            }
        }
    }

    fn settle(
        &self,
        capability: Capability,
        placeholder: MessageId,
        result: Result<Completion, ActionError>,
    ) -> ActionOutcome {
        let mut session = self.lock_session();
        session.phase = Phase::Settled;

        let outcome = match result {
            Ok(completion) => {
                if let Err(error) = finalize(&mut session.transcript, placeholder, completion) {
                    tracing::debug!(message_id = %placeholder, error = %error, "result not recorded");
                }
                let balance = session.credits.charge(capability.cost());
                tracing::info!(
                    capability = capability.name(),
                    message_id = %placeholder,
                    balance,
                    "action completed"
                );
                ActionOutcome::Completed { placeholder }
            }
            Err(error) => {
                tracing::warn!(
                    capability = capability.name(),
                    message_id = %placeholder,
                    kind = %error.kind,
                    error = %error.message,
                    "action failed"
                );
                let diagnostic = capability.diagnostic(&self.client.settings().base_url);
                if let Err(error) = session.transcript.seal_failed(placeholder, diagnostic) {
                    tracing::debug!(message_id = %placeholder, error = %error, "diagnostic not recorded");
                }
                ActionOutcome::Failed { placeholder, error }
            }
        };
        drop(session);

        self.emit(TranscriptEvent::Settled {
            placeholder,
            succeeded: matches!(outcome, ActionOutcome::Completed { .. }),
        });
        outcome
    }

    fn emit(&self, event: TranscriptEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        lock_unpoisoned(&self.session)
    }
}

fn finalize(
    transcript: &mut Transcript,
    placeholder: MessageId,
    completion: Completion,
) -> Result<(), TranscriptError> {
    if let Some(content) = completion.content {
        transcript.replace(placeholder, content)?;
    }
    if let Some(kind) = completion.kind {
        transcript.set_kind(placeholder, kind)?;
    }
    transcript.seal(placeholder)
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
