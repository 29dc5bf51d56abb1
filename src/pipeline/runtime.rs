//! Runs a crew's tasks against a chat model with function calling.
//!
//! Each task is one conversation: the agent's persona as the system prompt,
//! the rendered task plus earlier task answers as the user prompt. Tool calls
//! are executed and fed back until the model answers or the round budget is
//! spent, at which point tools are withdrawn and an answer is forced.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::ports::{ChainOutput, LlmClient, TaskChainRunner, TaskInputs};
use crate::common::constants::truncate_chars;
use crate::common::error::{Result, ScoutError};
use crate::config::LlmConfig;
use crate::crew::{render_template, CrewDefinition, OutputSchema, TaskDefinition};
use crate::observability::metrics;
use crate::pipeline::chat::{ChatMessage, ChatReply, ChatRequest, ToolSpec};
use crate::tools::ToolRegistry;

const FINAL_ANSWER_NUDGE: &str =
    "You have used all available tool calls. Give your final answer now using what you have gathered.";

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    max_tool_rounds: usize,
    max_tool_output_chars: usize,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, config: &LlmConfig) -> Self {
        Self {
            llm,
            tools,
            max_tool_rounds: config.max_tool_rounds,
            max_tool_output_chars: config.max_tool_output_chars,
        }
    }

    fn system_prompt(crew: &CrewDefinition, task: &TaskDefinition, inputs: &TaskInputs) -> Result<String> {
        let agent = crew.agent_for(task)?;
        Ok(format!(
            "You are {}.\nYour goal: {}\n\n{}",
            render_template(&agent.role, inputs)?,
            render_template(&agent.goal, inputs)?,
            render_template(&agent.backstory, inputs)?
        ))
    }

    fn user_prompt(task: &TaskDefinition, inputs: &TaskInputs, context: &[(String, String)]) -> Result<String> {
        let mut prompt = format!(
            "{}\n\nExpected output:\n{}",
            render_template(&task.description, inputs)?,
            render_template(&task.expected_output, inputs)?
        );
        if let Some(schema) = task.output_schema {
            prompt.push_str("\n\nReturn the result as JSON with this shape:\n");
            prompt.push_str(schema.shape_hint());
        }
        if !context.is_empty() {
            prompt.push_str("\n\nContext from previous tasks:");
            for (name, answer) in context {
                prompt.push_str(&format!("\n--- {} ---\n{}", name, answer));
            }
        }
        Ok(prompt)
    }

    async fn run_task(
        &self,
        crew: &CrewDefinition,
        task: &TaskDefinition,
        inputs: &TaskInputs,
        context: &[(String, String)],
    ) -> Result<String> {
        let agent = crew.agent_for(task)?;
        let specs = self.tools.specs_for(&agent.tools)?;
        let messages = vec![
            ChatMessage::System(Self::system_prompt(crew, task, inputs)?),
            ChatMessage::User(Self::user_prompt(task, inputs, context)?),
        ];
        info!("Running task {} with {} tools", task.name, specs.len());
        self.converse(messages, specs).await
    }

    /// Chat until the model answers. Tools stay on offer for at most
    /// `max_tool_rounds` replies.
    async fn converse(&self, mut messages: Vec<ChatMessage>, specs: Vec<ToolSpec>) -> Result<String> {
        let mut rounds = 0;
        loop {
            let offer_tools = !specs.is_empty() && rounds < self.max_tool_rounds;
            let request = ChatRequest {
                messages: messages.clone(),
                tools: if offer_tools { specs.clone() } else { Vec::new() },
                json_mode: false,
            };

            match self.llm.chat(request).await? {
                ChatReply::Answer(text) => return Ok(text),
                ChatReply::ToolCalls { content, .. } if !offer_tools => {
                    // Tools were not on offer; take whatever text came along.
                    return content
                        .filter(|c| !c.trim().is_empty())
                        .ok_or_else(|| ScoutError::agent("model requested tools after they were withdrawn"));
                }
                ChatReply::ToolCalls { content, calls } => {
                    rounds += 1;
                    metrics::agent::tool_round();
                    messages.push(ChatMessage::Assistant {
                        content,
                        tool_calls: calls.clone(),
                    });
                    for call in calls {
                        debug!("Tool call {} {}", call.name, call.arguments);
                        let output = self.tools.invoke(&call.name, &call.arguments).await;
                        messages.push(ChatMessage::Tool {
                            call_id: call.id,
                            content: truncate_chars(&output, self.max_tool_output_chars).to_string(),
                        });
                    }
                    if rounds == self.max_tool_rounds {
                        info!("Tool budget of {} rounds spent, forcing an answer", rounds);
                        messages.push(ChatMessage::User(FINAL_ANSWER_NUDGE.to_string()));
                    }
                }
            }
        }
    }

    /// JSON for a schema task: the answer itself when it already parses,
    /// otherwise one json-mode conversion call. `None` leaves the caller
    /// with the raw answer.
    async fn structure(&self, schema: OutputSchema, answer: &str) -> Option<Value> {
        if let Ok(value) = serde_json::from_str::<Value>(answer.trim()) {
            if value.is_object() || value.is_array() {
                return Some(value);
            }
        }

        metrics::agent::conversion_attempted();
        let request = ChatRequest {
            messages: vec![
                ChatMessage::System(format!(
                    "Convert the text you are given into JSON with exactly this shape:\n{}\n\
                     Use empty strings for unknown fields. Reply with the JSON object only.",
                    schema.shape_hint()
                )),
                ChatMessage::User(answer.to_string()),
            ],
            tools: Vec::new(),
            json_mode: true,
        };
        match self.llm.chat(request).await {
            Ok(ChatReply::Answer(text)) => serde_json::from_str::<Value>(text.trim())
                .map_err(|e| warn!("Conversion reply was not JSON: {}", e))
                .ok(),
            Ok(ChatReply::ToolCalls { .. }) => {
                warn!("Conversion call replied with tool calls");
                None
            }
            Err(e) => {
                warn!("Conversion call failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl TaskChainRunner for AgentRuntime {
    async fn kickoff(&self, crew: &CrewDefinition, inputs: &TaskInputs) -> Result<ChainOutput> {
        crew.check_inputs(inputs)?;

        let mut context: Vec<(String, String)> = Vec::new();
        let mut output = ChainOutput::default();
        for task in &crew.tasks {
            let answer = self.run_task(crew, task, inputs, &context).await?;
            metrics::agent::task_completed(&task.name);
            info!("Task {} finished ({} chars)", task.name, answer.chars().count());

            let structured = match task.output_schema {
                Some(schema) => self.structure(schema, &answer).await,
                None => None,
            };
            context.push((task.name.clone(), answer.clone()));
            output = ChainOutput {
                raw: answer,
                structured,
            };
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chat::ToolCall;
    use crate::tools::{str_arg, Tool, ToolError};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<ChatReply>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<ChatReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ScoutError::agent("script exhausted"))
        }
    }

    struct Lookup;

    #[async_trait]
    impl Tool for Lookup {
        fn name(&self) -> &'static str {
            "lookup"
        }
        fn description(&self) -> &'static str {
            "Look up a festival"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"q": {"type": "string"}}})
        }
        async fn run(&self, args: &Value) -> std::result::Result<String, ToolError> {
            Ok(format!("found {}", str_arg(args, "q")?))
        }
    }

    const CREW: &str = r#"
        name = "test"
        [agents.scout]
        role = "Scout for {region}"
        goal = "Find festivals"
        backstory = "Knows the scene."
        tools = ["lookup"]
        [agents.writer]
        role = "Writer"
        goal = "Summarise"
        backstory = "Terse."
        [[tasks]]
        name = "find"
        agent = "scout"
        description = "Find festivals in {region}"
        expected_output = "A list"
        [[tasks]]
        name = "write"
        agent = "writer"
        description = "Write them up"
        expected_output = "JSON"
        output_schema = "festival_list"
    "#;

    fn runtime(llm: Arc<ScriptedLlm>, max_tool_rounds: usize) -> AgentRuntime {
        let mut tools = ToolRegistry::new();
        tools.register(Lookup);
        let config = LlmConfig {
            max_tool_rounds,
            ..LlmConfig::default()
        };
        AgentRuntime::new(llm, tools, &config)
    }

    fn inputs() -> TaskInputs {
        [("region".to_string(), "Japan".to_string())].into_iter().collect()
    }

    fn call(q: &str) -> ChatReply {
        ChatReply::ToolCalls {
            content: None,
            calls: vec![ToolCall {
                id: format!("call_{}", q),
                name: "lookup".into(),
                arguments: json!({ "q": q }).to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn tool_results_flow_back_and_context_reaches_next_task() {
        let llm = ScriptedLlm::new(vec![
            call("fuji"),
            ChatReply::Answer("Fuji Rock, Naeba".into()),
            ChatReply::Answer(r#"{"festivals": [{"name": "Fuji Rock"}]}"#.into()),
        ]);
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        let output = runtime(llm.clone(), 3).kickoff(&crew, &inputs()).await.unwrap();

        assert_eq!(output.structured, Some(json!({"festivals": [{"name": "Fuji Rock"}]})));
        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert!(matches!(&requests[0].messages[0], ChatMessage::System(s) if s.contains("Scout for Japan")));
        assert!(requests[1]
            .messages
            .iter()
            .any(|m| matches!(m, ChatMessage::Tool { content, .. } if content == "found fuji")));
        // The writer has no tools and sees the scout's answer.
        assert!(requests[2].tools.is_empty());
        assert!(matches!(&requests[2].messages[1], ChatMessage::User(u) if u.contains("Fuji Rock, Naeba")));
    }

    #[tokio::test]
    async fn tools_are_withdrawn_after_the_round_budget() {
        let llm = ScriptedLlm::new(vec![
            call("a"),
            ChatReply::Answer("forced".into()),
            ChatReply::Answer("[]".into()),
        ]);
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        runtime(llm.clone(), 1).kickoff(&crew, &inputs()).await.unwrap();

        let requests = llm.requests();
        assert_eq!(requests[0].tools.len(), 1);
        assert!(requests[1].tools.is_empty());
        assert!(matches!(requests[1].messages.last(), Some(ChatMessage::User(u)) if u == FINAL_ANSWER_NUDGE));
    }

    #[tokio::test]
    async fn prose_answer_gets_a_json_mode_conversion() {
        let llm = ScriptedLlm::new(vec![
            ChatReply::Answer("Fuji Rock".into()),
            ChatReply::Answer("Fuji Rock is a High fit.".into()),
            ChatReply::Answer(r#"{"festivals": [{"name": "Fuji Rock", "genre_fit_score": "High"}]}"#.into()),
        ]);
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        let output = runtime(llm.clone(), 3).kickoff(&crew, &inputs()).await.unwrap();

        assert_eq!(output.raw, "Fuji Rock is a High fit.");
        assert!(output.structured.is_some());
        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].json_mode);
    }

    #[tokio::test]
    async fn failed_conversion_leaves_raw_text_only() {
        let llm = ScriptedLlm::new(vec![
            ChatReply::Answer("Fuji Rock".into()),
            ChatReply::Answer("Nothing structured here".into()),
            ChatReply::Answer("still not json".into()),
        ]);
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        let output = runtime(llm, 3).kickoff(&crew, &inputs()).await.unwrap();
        assert_eq!(output.raw, "Nothing structured here");
        assert_eq!(output.structured, None);
    }

    #[tokio::test]
    async fn missing_input_fails_before_any_model_call() {
        let llm = ScriptedLlm::new(vec![]);
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        let err = runtime(llm.clone(), 3)
            .kickoff(&crew, &TaskInputs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::MissingInput(ref key) if key == "region"));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn backend_error_fails_the_chain() {
        let llm = ScriptedLlm::new(vec![]);
        let crew = CrewDefinition::from_toml(CREW).unwrap();
        assert!(runtime(llm, 3).kickoff(&crew, &inputs()).await.is_err());
    }
}
