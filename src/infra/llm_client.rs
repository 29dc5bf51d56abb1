use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::app::ports::LlmClient;
use crate::common::error::{Result, ScoutError};
use crate::config::LlmConfig;
use crate::infra::http_client::{build_client, ensure_success};
use crate::pipeline::chat::{ChatMessage, ChatReply, ChatRequest, ToolCall, ToolSpec};

/// OpenAI-compatible `/chat/completions` client with function calling.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: build_client(Duration::from_secs(config.timeout_seconds))?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    fn build_body(&self, request: &ChatRequest) -> WireRequest {
        WireRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request.tools.iter().map(to_wire_tool).collect(),
            response_format: request
                .json_mode
                .then(|| json!({ "type": "json_object" })),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    temperature: f32,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn to_wire_message(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System(content) => json!({ "role": "system", "content": content }),
        ChatMessage::User(content) => json!({ "role": "user", "content": content }),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut value = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": { "name": call.name, "arguments": call.arguments },
                        })
                    })
                    .collect();
            }
            value
        }
        ChatMessage::Tool { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

fn to_wire_tool(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_reply(response: WireResponse) -> Result<ChatReply> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ScoutError::agent("chat response had no choices"))?;
    let tool_calls = message.tool_calls.unwrap_or_default();
    if tool_calls.is_empty() {
        return Ok(ChatReply::Answer(message.content.unwrap_or_default()));
    }
    let calls = tool_calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();
    Ok(ChatReply::ToolCalls {
        content: message.content,
        calls,
    })
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ScoutError::Config("OPENAI_API_KEY environment variable is not set".into()))?;
        let body = self.build_body(&request);
        debug!(
            "Chat request: {} messages, {} tools, json_mode={}",
            body.messages.len(),
            body.tools.len(),
            request.json_mode
        );
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let text = ensure_success(resp).await?.text().await?;
        let parsed: WireResponse = serde_json::from_str(&text)?;
        parse_reply(parsed)
    }
}
