//! Tools the agents may call.
//!
//! A tool never fails the chain: every outcome, including a missing API key
//! or a dead endpoint, comes back to the model as text. `ToolRegistry::invoke`
//! is the one place that flattens `ToolError` into that text.

pub mod email;
pub mod web;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::common::error::{Result, ScoutError};
use crate::config::{AppConfig, Secrets};
use crate::infra::firecrawl::FirecrawlClient;
use crate::infra::http_client::build_client;
use crate::infra::hunter::HunterClient;
use crate::infra::serper::SerperClient;
use crate::observability::metrics;
use crate::pipeline::chat::ToolSpec;

pub const FIRECRAWL_SEARCH: &str = "firecrawl_search";
pub const FIRECRAWL_SCRAPE: &str = "firecrawl_scrape";
pub const WEBSITE_CONTACT_FINDER: &str = "website_contact_finder";
pub const SERPER_SEARCH: &str = "serper_search";
pub const HUNTER_DOMAIN_SEARCH: &str = "hunter_domain_search";
pub const HUNTER_EMAIL_VERIFIER: &str = "hunter_email_verifier";

#[derive(Error, Debug)]
pub enum ToolError {
    /// `{0}` is the missing variable, `{1}` what gets skipped
    #[error("{0} not configured, skipping {1}")]
    NotConfigured(&'static str, &'static str),

    #[error("Missing required argument '{0}'")]
    MissingArgument(&'static str),

    /// Fully formatted failure text for the model
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;
    async fn run(&self, args: &Value) -> std::result::Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

pub(crate) fn str_arg<'a>(args: &'a Value, key: &'static str) -> std::result::Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ToolError::MissingArgument(key))
}

pub(crate) fn u32_arg(args: &Value, key: &str, default: u32) -> u32 {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(default)
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All six tools wired to their HTTP clients.
    pub fn standard(config: &AppConfig, secrets: &Secrets) -> Result<Self> {
        let tools = &config.tools;
        let api_http = build_client(tools.http_timeout())?;
        // Scrapes are raced against their own deadline; the client limit only
        // reaps requests that outlive it.
        let scrape_http = build_client(tools.scrape_timeout() * 3)?;

        let firecrawl_search = FirecrawlClient::new(
            api_http.clone(),
            &tools.firecrawl_base_url,
            secrets.firecrawl_api_key.clone(),
        );
        let firecrawl_scrape = FirecrawlClient::new(
            scrape_http,
            &tools.firecrawl_base_url,
            secrets.firecrawl_api_key.clone(),
        );
        let hunter = HunterClient::new(
            api_http.clone(),
            &tools.hunter_base_url,
            secrets.hunter_api_key.clone(),
        );
        let serper = SerperClient::new(api_http, &tools.serper_base_url, secrets.serper_api_key.clone());

        let mut registry = Self::new();
        registry.register(web::SearchTool::new(firecrawl_search, tools.search_limit));
        registry.register(web::ScrapeTool::new(firecrawl_scrape.clone(), tools.scrape_timeout()));
        registry.register(web::ContactFinderTool::new(firecrawl_scrape, tools.scrape_timeout()));
        registry.register(web::SerperSearchTool::new(serper, tools.search_limit));
        registry.register(email::DomainSearchTool::new(hunter.clone(), tools.domain_search_limit));
        registry.register(email::EmailVerifierTool::new(hunter, tools.verify_delay()));

        info!("Registered {} tools", registry.tools.len());
        Ok(registry)
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// Specs for an agent's tool list; an unknown name is a crew error.
    pub fn specs_for(&self, names: &[String]) -> Result<Vec<ToolSpec>> {
        names
            .iter()
            .map(|name| {
                self.tools
                    .get(name.as_str())
                    .map(|tool| tool.spec())
                    .ok_or_else(|| ScoutError::Crew(format!("unknown tool '{}'", name)))
            })
            .collect()
    }

    /// Run a tool call from the model. Always returns text.
    pub async fn invoke(&self, name: &str, raw_args: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!("Model requested unknown tool {}", name);
            return format!("Unknown tool: {}", name);
        };
        let args: Value = if raw_args.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(raw_args) {
                Ok(args) => args,
                Err(e) => {
                    metrics::tools::call_error(tool.name());
                    return format!("Invalid arguments for {}: {}", name, e);
                }
            }
        };
        match tool.run(&args).await {
            Ok(text) => {
                metrics::tools::call_success(tool.name());
                text
            }
            Err(err @ ToolError::NotConfigured(..)) => {
                metrics::tools::call_skipped(tool.name());
                info!("{}", err);
                err.to_string()
            }
            Err(err) => {
                metrics::tools::call_error(tool.name());
                warn!("Tool {} failed: {}", name, err);
                err.to_string()
            }
        }
    }
}
