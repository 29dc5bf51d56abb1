//! Declarative agent and task definitions.
//!
//! A crew is a set of agents (role, goal, backstory, tool names) and an
//! ordered list of tasks, each assigned to one agent. Definitions are TOML
//! files embedded at compile time; `{placeholder}` markers in any text field
//! are filled from the task inputs when the chain runs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::app::ports::TaskInputs;
use crate::common::error::{Result, ScoutError};

const RESEARCH_CREW: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/crews/research.toml"));
const ENRICHMENT_CREW: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/crews/enrichment.toml"));

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub agent: String,
    pub description: String,
    pub expected_output: String,
    #[serde(default)]
    pub output_schema: Option<OutputSchema>,
}

/// Record shape a task must end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSchema {
    FestivalList,
    EnrichedContact,
}

impl OutputSchema {
    /// JSON shape shown to the model, both in the task prompt and in the
    /// conversion pass.
    pub fn shape_hint(&self) -> &'static str {
        match self {
            OutputSchema::FestivalList => {
                r#"{"festivals": [{"name": "", "country": "", "location": "", "dates": "", "genres": "", "website": "", "description": "", "genre_fit_score": "High|Medium|Low", "why_it_fits": "", "known_acts": "", "submission_info": ""}]}"#
            }
            OutputSchema::EnrichedContact => {
                r#"{"festival_name": "", "confidence": "High|Medium|Low", "source": "", "notes": "", "contacts": [{"name": "", "role": "", "email": ""}]}"#
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewDefinition {
    pub name: String,
    pub agents: BTreeMap<String, AgentDefinition>,
    pub tasks: Vec<TaskDefinition>,
}

impl CrewDefinition {
    /// Festival discovery and scoring crew.
    pub fn research() -> Result<Self> {
        Self::from_toml(RESEARCH_CREW)
    }

    /// Contact discovery and email enrichment crew.
    pub fn enrichment() -> Result<Self> {
        Self::from_toml(ENRICHMENT_CREW)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let crew: CrewDefinition = toml::from_str(content)?;
        crew.validate()?;
        Ok(crew)
    }

    fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(ScoutError::Crew(format!("crew '{}' has no tasks", self.name)));
        }
        for task in &self.tasks {
            if !self.agents.contains_key(&task.agent) {
                return Err(ScoutError::Crew(format!(
                    "task '{}' references unknown agent '{}'",
                    task.name, task.agent
                )));
            }
        }
        Ok(())
    }

    pub fn agent_for(&self, task: &TaskDefinition) -> Result<&AgentDefinition> {
        self.agents.get(&task.agent).ok_or_else(|| {
            ScoutError::Crew(format!("task '{}' references unknown agent '{}'", task.name, task.agent))
        })
    }

    /// Every placeholder used by any agent or task text.
    pub fn required_inputs(&self) -> BTreeSet<String> {
        let agent_texts = self
            .agents
            .values()
            .flat_map(|a| [a.role.as_str(), a.goal.as_str(), a.backstory.as_str()]);
        let task_texts = self
            .tasks
            .iter()
            .flat_map(|t| [t.description.as_str(), t.expected_output.as_str()]);
        agent_texts
            .chain(task_texts)
            .flat_map(|text| PLACEHOLDER.captures_iter(text))
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Fail fast before any model call if an input is missing.
    pub fn check_inputs(&self, inputs: &TaskInputs) -> Result<()> {
        match self
            .required_inputs()
            .into_iter()
            .find(|key| !inputs.contains_key(key))
        {
            Some(missing) => Err(ScoutError::MissingInput(missing)),
            None => Ok(()),
        }
    }
}

/// Replace each `{key}` with its input value.
pub fn render_template(template: &str, inputs: &TaskInputs) -> Result<String> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|key| !inputs.contains_key(key))
    {
        return Err(ScoutError::MissingInput(missing));
    }
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        inputs.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.trim().to_string())
}
