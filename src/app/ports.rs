use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::common::error::Result;
use crate::crew::CrewDefinition;
use crate::pipeline::chat::{ChatReply, ChatRequest};

/// Named values interpolated into task templates.
pub type TaskInputs = BTreeMap<String, String>;

/// What an agent chain hands back: either an object that already matched the
/// requested shape, or the final answer as free text.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput<T> {
    Structured(T),
    RawText(String),
}

/// Untyped result of a chain run. `structured` is only set when the last task
/// requested an output schema and the runtime obtained JSON for it.
#[derive(Debug, Clone, Default)]
pub struct ChainOutput {
    pub raw: String,
    pub structured: Option<Value>,
}

impl ChainOutput {
    pub fn text(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            structured: None,
        }
    }

    /// Keep the structured value only if it deserializes into `T`.
    pub fn into_agent_output<T: DeserializeOwned>(self) -> AgentOutput<T> {
        match self.structured {
            Some(value) => match serde_json::from_value::<T>(value) {
                Ok(typed) => AgentOutput::Structured(typed),
                Err(e) => {
                    tracing::debug!("Structured output did not match schema: {}", e);
                    AgentOutput::RawText(self.raw)
                }
            },
            None => AgentOutput::RawText(self.raw),
        }
    }
}

/// Runs a crew's tasks in order against the agent runtime.
#[async_trait]
pub trait TaskChainRunner: Send + Sync {
    async fn kickoff(&self, crew: &CrewDefinition, inputs: &TaskInputs) -> Result<ChainOutput>;
}

/// Chat-completion backend with function calling.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply>;
}
