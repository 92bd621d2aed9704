//! Chat-completions wire types and the backend abstraction.
//!
//! Messages serialize in the role-tagged format the chat-completions API expects, so the
//! conversation history can be sent as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::error::ToolError;
use crate::tools::ToolDefinition;

pub mod openai;

pub use openai::OpenAiClient;

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant { content: Some(content.into()), tool_calls: None }
    }

    /// The assistant message that precedes a tool result in the history.
    pub fn tool_invocation_echo(call: ToolCall) -> Self {
        Message::Assistant { content: None, tool_calls: Some(vec![call]) }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool { content: content.into(), tool_call_id: tool_call_id.into() }
    }
}

/// A function call requested by the model, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// Name and JSON-encoded arguments of a requested call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool call with its arguments decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
    /// The original call, echoed back verbatim into the history.
    pub raw: ToolCall,
}

impl TryFrom<ToolCall> for ToolInvocation {
    type Error = ToolError;

    fn try_from(call: ToolCall) -> Result<Self, Self::Error> {
        let arguments = if call.function.arguments.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&call.function.arguments).map_err(ToolError::InvalidArguments)?
        };

        Ok(Self {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments,
            raw: call,
        })
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FinishReason {
    ToolCalls,
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other(reason) => reason,
        }
    }
}

impl From<&str> for FinishReason {
    fn from(value: &str) -> Self {
        match value {
            "tool_calls" => FinishReason::ToolCalls,
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FinishReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FinishReason::from(raw.as_str()))
    }
}

/// Message as returned inside a completion choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub choices: Vec<Choice>,
}

/// What the model wants to happen next.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantTurn {
    DirectReply { content: String },
    /// Only the first call is dispatched; `ignored_calls` counts the rest.
    ToolInvocationPending { call: ToolCall, ignored_calls: usize },
}

impl ChatResponse {
    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.first_choice().map(|c| &c.finish_reason)
    }

    /// Classifies the first choice; an empty choice list reads as an empty reply.
    pub fn into_turn(self) -> AssistantTurn {
        let Some(choice) = self.choices.into_iter().next() else {
            return AssistantTurn::DirectReply { content: String::new() };
        };

        let message = choice.message;
        match message.tool_calls.filter(|calls| !calls.is_empty()) {
            Some(mut calls) => {
                let ignored_calls = calls.len() - 1;
                AssistantTurn::ToolInvocationPending { call: calls.remove(0), ignored_calls }
            }
            None => AssistantTurn::DirectReply { content: message.content.unwrap_or_default() },
        }
    }
}

/// A chat-completions capable service.
#[async_trait]
pub trait ChatBackend: Send + Sync + Debug {
    /// Issues one completion request; `tools` is omitted from the request when `None`.
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> anyhow::Result<ChatResponse>;
}
