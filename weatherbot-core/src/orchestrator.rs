//! Turn-by-turn driver of the weather conversation.
//!
//! Each user line goes to the chat backend together with the tool schema. When the model
//! asks for the weather tool, the lookup runs, the call and its result are folded into the
//! history and a second completion produces the answer shown to the user.

use serde_json::json;
use tracing::{debug, warn};

use crate::{
    chat::{AssistantTurn, ChatBackend, ChatResponse, FinishReason, Message, ToolCall, ToolInvocation},
    error::{SessionError, ToolError},
    model::ForecastReport,
    provider::ForecastSource,
    tools::{self, ToolDefinition},
    validator,
};

pub const PROMPT: &str = "What's your question about the weather today? ";
pub const PROGRESS_NOTICE: &str = "Fetching the weather, this might take a while...";
pub const EXIT_KEYWORDS: [&str; 3] = ["exit", "quit", "goodbye"];

const TURN_REASONS: [FinishReason; 2] = [FinishReason::ToolCalls, FinishReason::Stop];
const FOLLOW_UP_REASONS: [FinishReason; 1] = [FinishReason::Stop];

/// Exact, case-insensitive match against [`EXIT_KEYWORDS`].
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    EXIT_KEYWORDS.iter().any(|k| input.eq_ignore_ascii_case(k))
}

/// Where the conversation reads user input and writes its output.
pub trait Console {
    /// Returns `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>>;
    fn reply(&mut self, text: &str);
    fn notice(&mut self, text: &str);
    fn error(&mut self, text: &str);
}

/// Append-only message log of one session.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self { messages: vec![Message::system(prompt)] }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> &[Message] {
        &self.messages[self.messages.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingUserInput,
    RequestingCompletion,
    DispatchingTool,
    Responding,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    Exit,
}

#[derive(Debug)]
pub struct ConversationOrchestrator<C, F> {
    chat: C,
    forecasts: F,
    tools: Vec<ToolDefinition>,
    history: ConversationHistory,
    state: SessionState,
}

impl<C: ChatBackend, F: ForecastSource> ConversationOrchestrator<C, F> {
    pub fn new(chat: C, forecasts: F, system_prompt: &str) -> Self {
        Self {
            chat,
            forecasts,
            tools: tools::weather_tools(),
            history: ConversationHistory::with_system_prompt(system_prompt),
            state: SessionState::AwaitingUserInput,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Prompt loop; returns `Err` only for conditions that end the session.
    pub async fn run(&mut self, console: &mut dyn Console) -> Result<(), SessionError> {
        loop {
            self.transition(SessionState::AwaitingUserInput);

            let line = match console.read_line(PROMPT) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => return Err(self.fail(SessionError::Console(err), console)),
            };

            match self.handle_input(&line, console).await {
                Ok(TurnOutcome::Continue) => {}
                Ok(TurnOutcome::Exit) => break,
                Err(err) => return Err(self.fail(err, console)),
            }
        }

        self.transition(SessionState::Finished);
        Ok(())
    }

    /// Processes one line of user input to completion.
    pub async fn handle_input(
        &mut self,
        input: &str,
        console: &mut dyn Console,
    ) -> Result<TurnOutcome, SessionError> {
        if is_exit_command(input) {
            return Ok(TurnOutcome::Exit);
        }
        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnOutcome::Continue);
        }

        self.history.push(Message::user(input));

        self.transition(SessionState::RequestingCompletion);
        let response = self.request(true).await?;
        validator::validate(&response, &TURN_REASONS)?;

        match response.into_turn() {
            AssistantTurn::DirectReply { content } => {
                self.transition(SessionState::Responding);
                self.respond(content, console);
            }
            AssistantTurn::ToolInvocationPending { call, ignored_calls } => {
                if ignored_calls > 0 {
                    warn!(ignored_calls, "Model requested several tool calls; only the first is run");
                }

                self.transition(SessionState::DispatchingTool);
                self.dispatch(call, console).await?;

                self.transition(SessionState::RequestingCompletion);
                let follow_up = self.request(false).await?;
                validator::validate(&follow_up, &FOLLOW_UP_REASONS)?;

                self.transition(SessionState::Responding);
                self.respond(reply_text(follow_up), console);
            }
        }

        Ok(TurnOutcome::Continue)
    }

    async fn request(&self, with_tools: bool) -> Result<ChatResponse, SessionError> {
        let tools = with_tools.then_some(self.tools.as_slice());
        self.chat
            .complete(self.history.messages(), tools)
            .await
            .map_err(SessionError::Chat)
    }

    /// Runs the requested tool and appends the call echo and its result, in that order.
    async fn dispatch(&mut self, call: ToolCall, console: &mut dyn Console) -> Result<(), SessionError> {
        let outcome = self.run_tool(call.clone(), console).await;

        let content = match outcome {
            Ok(report) => json!({ "weather": report }).to_string(),
            Err(ToolError::Fetch(err)) if err.is_fatal() => return Err(SessionError::Fetch(err)),
            Err(err) => {
                warn!(error = %err, tool_call_id = %call.id, "Tool call failed");
                console.error(&err.to_string());
                json!({ "error": err.to_string() }).to_string()
            }
        };

        let id = call.id.clone();
        self.history.push(Message::tool_invocation_echo(call));
        self.history.push(Message::tool_result(id, content));
        Ok(())
    }

    async fn run_tool(&self, call: ToolCall, console: &mut dyn Console) -> Result<ForecastReport, ToolError> {
        let invocation = ToolInvocation::try_from(call)?;
        let location = tools::location_argument(&invocation)?;
        debug!(tool = %invocation.name, location, "Dispatching tool call");

        console.notice(PROGRESS_NOTICE);
        Ok(self.forecasts.fetch_forecast(location).await?)
    }

    fn respond(&mut self, content: String, console: &mut dyn Console) {
        console.reply(&content);
        self.history.push(Message::assistant(content));
        self.transition(SessionState::AwaitingUserInput);
    }

    fn fail(&mut self, err: SessionError, console: &mut dyn Console) -> SessionError {
        console.error(&err.to_string());
        self.transition(SessionState::Finished);
        err
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Session state change");
            self.state = next;
        }
    }
}

fn reply_text(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}
