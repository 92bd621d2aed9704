use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    Config,
    chat::{ChatBackend, ChatResponse, Message},
    config::ServiceId,
    tools::ToolDefinition,
};

/// Chat-completions client; one attempt per request, no retries.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    endpoint: String,
    model: String,
    user: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec<'a>>>,
    user: &'a str,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        endpoint: String,
        model: String,
        user: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the chat service")?;

        Ok(Self { api_key, endpoint, model, user, http })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key(ServiceId::OpenAi)?;
        let openai = &config.openai;

        Self::new(
            api_key.to_owned(),
            openai.endpoint.clone(),
            openai.model.clone(),
            openai.user.clone(),
            Duration::from_secs(openai.timeout_secs),
        )
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        tools: Option<&'a [ToolDefinition]>,
    ) -> ChatRequest<'a> {
        let tools = tools
            .filter(|defs| !defs.is_empty())
            .map(|defs| defs.iter().map(|function| ToolSpec { kind: "function", function }).collect());

        ChatRequest { model: &self.model, messages, tools, user: &self.user }
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatResponse> {
        let request = self.build_request(messages, tools);
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = messages.len(),
            with_tools = request.tools.is_some(),
            "Requesting chat completion"
        );

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to the chat service")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read chat service response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Chat request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse chat completion JSON")?;

        debug!(
            id = parsed.id.as_deref().unwrap_or("<none>"),
            finish_reason = parsed.finish_reason().map(|r| r.as_str()).unwrap_or("<missing>"),
            "Received chat completion"
        );

        Ok(parsed)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
