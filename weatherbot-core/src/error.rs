use thiserror::Error;

use crate::chat::FinishReason;

/// Failures of the location/forecast lookup.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint did not answer within the configured timeout.
    #[error("The weather is very slow today ({endpoint} request timed out). Please try again.")]
    Timeout { endpoint: &'static str },

    /// Connection refused, DNS failure, TLS failure and the like.
    #[error("Could not reach the {endpoint} service: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("The {endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("The {endpoint} response could not be decoded: {detail}")]
    MalformedResponse { endpoint: &'static str, detail: String },

    #[error("Missing key in {what}: something went wrong {context}")]
    MissingField { what: String, context: &'static str },

    #[error("Something went wrong getting the weather, the server response is empty")]
    EmptyForecast,
}

impl FetchError {
    /// Timeouts may succeed when the user simply asks again.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Transport and HTTP status failures end the session; payload problems only end the lookup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Transport { .. } | FetchError::Status { .. })
    }

    pub(crate) fn missing_location(what: impl Into<String>) -> Self {
        FetchError::MissingField { what: what.into(), context: "resolving the location" }
    }

    pub(crate) fn missing_weather(what: impl Into<String>) -> Self {
        FetchError::MissingField { what: what.into(), context: "getting the weather" }
    }
}

/// Disallowed termination reasons of a chat completion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The conversation was too long for the context window.")]
    ContextOverflow,

    #[error("The content was filtered due to policy violations.")]
    PolicyViolation,

    #[error("Unexpected finish reason '{actual}', expected one of [{}]", join_reasons(.expected))]
    UnexpectedFinishReason {
        actual: String,
        expected: Vec<FinishReason>,
    },
}

fn join_reasons(reasons: &[FinishReason]) -> String {
    reasons.iter().map(FinishReason::as_str).collect::<Vec<_>>().join(", ")
}

/// Problems turning a tool invocation into a lookup.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Tool arguments are not valid JSON: {0}")]
    InvalidArguments(#[source] serde_json::Error),

    #[error("Tool call is missing the '{0}' argument")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Conditions that end the whole chat session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Chat service error: {0:#}")]
    Chat(#[source] anyhow::Error),

    #[error("Console error: {0:#}")]
    Console(#[source] anyhow::Error),
}
