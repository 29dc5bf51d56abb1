use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{str_arg, u32_arg, Tool, ToolError};
use crate::common::constants::{truncate_chars, FIRECRAWL_API_KEY_ENV, SERPER_API_KEY_ENV};
use crate::infra::firecrawl::{FirecrawlClient, SearchHit};
use crate::infra::serper::{OrganicResult, SerperClient};
use crate::observability::metrics;

const SCRAPE_MAX_CHARS: usize = 3000;
const CONTACT_PAGE_MAX_CHARS: usize = 1500;
const HOMEPAGE_MAX_CHARS: usize = 2000;
/// Pages shorter than this are treated as empty shells
const CONTACT_PAGE_MIN_CHARS: usize = 100;
const CONTACT_PATHS: [&str; 6] = ["/contact", "/about", "/team", "/press", "/organizers", "/submissions"];

/// Outcome of one bounded scrape.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeAttempt {
    Content(String),
    TimedOut,
    Failed(String),
}

/// Scrape `url` in its own task and give up after `limit`. A task that
/// misses the deadline is detached, not awaited, so the caller moves on.
pub async fn scrape_with_timeout(client: &FirecrawlClient, url: &str, limit: Duration) -> ScrapeAttempt {
    let client = client.clone();
    let target = url.to_string();
    let worker = tokio::spawn(async move { client.scrape_markdown(&target).await });
    match tokio::time::timeout(limit, worker).await {
        Ok(Ok(Ok(markdown))) => ScrapeAttempt::Content(markdown),
        Ok(Ok(Err(e))) => ScrapeAttempt::Failed(e.to_string()),
        Ok(Err(join_error)) => ScrapeAttempt::Failed(join_error.to_string()),
        Err(_) => {
            metrics::tools::scrape_timeout();
            warn!("Scrape of {} exceeded {:?}, abandoning it", url, limit);
            ScrapeAttempt::TimedOut
        }
    }
}

/// Web search through Firecrawl.
pub struct SearchTool {
    client: FirecrawlClient,
    default_limit: u32,
}

impl SearchTool {
    pub fn new(client: FirecrawlClient, default_limit: u32) -> Self {
        Self {
            client,
            default_limit,
        }
    }
}

pub(crate) fn format_search_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "URL: {}\nTitle: {}\nSnippet: {}\n",
                hit.url,
                hit.title.as_deref().filter(|t| !t.is_empty()).unwrap_or("No title"),
                hit.description.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        super::FIRECRAWL_SEARCH
    }

    fn description(&self) -> &'static str {
        "Searches the web and returns matching pages with URL, title and snippet. \
         Use it to discover festival websites and articles."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "limit": {"type": "integer", "description": "Maximum results", "default": self.default_limit}
            },
            "required": ["query"]
        })
    }

    async fn run(&self, args: &Value) -> Result<String, ToolError> {
        if !self.client.is_configured() {
            return Err(ToolError::NotConfigured(FIRECRAWL_API_KEY_ENV, "web search"));
        }
        let query = str_arg(args, "query")?;
        let limit = u32_arg(args, "limit", self.default_limit);
        let hits = self
            .client
            .search(query, limit)
            .await
            .map_err(|e| ToolError::Failed(format!("Search failed: {}", e)))?;
        if hits.is_empty() {
            return Ok(format!("No results found for query: {}", query));
        }
        Ok(format_search_hits(&hits))
    }
}

/// Single-page scrape returning markdown.
pub struct ScrapeTool {
    client: FirecrawlClient,
    timeout: Duration,
}

impl ScrapeTool {
    pub fn new(client: FirecrawlClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &'static str {
        super::FIRECRAWL_SCRAPE
    }

    fn description(&self) -> &'static str {
        "Scrapes one web page and returns its content as markdown. Input is the full URL."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string", "description": "Full URL to scrape"}},
            "required": ["url"]
        })
    }

    async fn run(&self, args: &Value) -> Result<String, ToolError> {
        if !self.client.is_configured() {
            return Err(ToolError::NotConfigured(FIRECRAWL_API_KEY_ENV, "page scrape"));
        }
        let url = str_arg(args, "url")?;
        match scrape_with_timeout(&self.client, url, self.timeout).await {
            ScrapeAttempt::Content(markdown) if markdown.trim().is_empty() => {
                Ok(format!("No content retrieved from {}", url))
            }
            ScrapeAttempt::Content(markdown) => Ok(truncate_chars(&markdown, SCRAPE_MAX_CHARS).to_string()),
            ScrapeAttempt::TimedOut => Ok(format!("Timed out retrieving content from {}", url)),
            ScrapeAttempt::Failed(e) => Err(ToolError::Failed(format!(
                "Could not retrieve content from {}: {}",
                url, e
            ))),
        }
    }
}

/// Crawls the usual contact-related pages of a festival site.
pub struct ContactFinderTool {
    client: FirecrawlClient,
    timeout: Duration,
}

impl ContactFinderTool {
    pub fn new(client: FirecrawlClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Tool for ContactFinderTool {
    fn name(&self) -> &'static str {
        super::WEBSITE_CONTACT_FINDER
    }

    fn description(&self) -> &'static str {
        "Crawls the contact, about, team, press, organizers and submissions pages of a \
         festival website and returns what they say. Input is the site's base URL."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"base_url": {"type": "string", "description": "Festival base URL, e.g. https://festival.com"}},
            "required": ["base_url"]
        })
    }

    async fn run(&self, args: &Value) -> Result<String, ToolError> {
        if !self.client.is_configured() {
            return Err(ToolError::NotConfigured(FIRECRAWL_API_KEY_ENV, "contact page crawl"));
        }
        let base_url = str_arg(args, "base_url")?.trim_end_matches('/');
        let mut sections = Vec::new();

        for path in CONTACT_PATHS {
            let url = format!("{}{}", base_url, path);
            match scrape_with_timeout(&self.client, &url, self.timeout).await {
                ScrapeAttempt::Content(markdown) if markdown.chars().count() > CONTACT_PAGE_MIN_CHARS => {
                    sections.push(format!(
                        "=== {} ===\n{}",
                        url,
                        truncate_chars(&markdown, CONTACT_PAGE_MAX_CHARS)
                    ));
                }
                other => debug!("Nothing usable at {}: {:?}", url, other),
            }
        }

        if sections.is_empty() {
            match scrape_with_timeout(&self.client, base_url, self.timeout).await {
                ScrapeAttempt::Content(markdown) if !markdown.trim().is_empty() => {
                    sections.push(format!(
                        "=== {} (homepage) ===\n{}",
                        base_url,
                        truncate_chars(&markdown, HOMEPAGE_MAX_CHARS)
                    ));
                }
                ScrapeAttempt::Content(_) => {}
                ScrapeAttempt::TimedOut => {
                    return Ok(format!(
                        "Timed out retrieving contact information from {}",
                        base_url
                    ))
                }
                ScrapeAttempt::Failed(e) => {
                    return Err(ToolError::Failed(format!(
                        "Could not retrieve any contact information from {}: {}",
                        base_url, e
                    )))
                }
            }
        }

        if sections.is_empty() {
            Ok(format!("No contact information found at {}", base_url))
        } else {
            Ok(sections.join("\n\n"))
        }
    }
}

/// Google search through Serper, for organizer companies and press coverage.
pub struct SerperSearchTool {
    client: SerperClient,
    default_limit: u32,
}

impl SerperSearchTool {
    pub fn new(client: SerperClient, default_limit: u32) -> Self {
        Self {
            client,
            default_limit,
        }
    }
}

pub(crate) fn format_organic(results: &[OrganicResult]) -> String {
    results
        .iter()
        .map(|r| format!("Title: {}\nLink: {}\nSnippet: {}\n", r.title, r.link, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for SerperSearchTool {
    fn name(&self) -> &'static str {
        super::SERPER_SEARCH
    }

    fn description(&self) -> &'static str {
        "Google search. Use it to find the company behind a festival, press articles \
         naming organizers, or pages the festival site does not link."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string", "description": "Search query"}},
            "required": ["query"]
        })
    }

    async fn run(&self, args: &Value) -> Result<String, ToolError> {
        if !self.client.is_configured() {
            return Err(ToolError::NotConfigured(SERPER_API_KEY_ENV, "web search"));
        }
        let query = str_arg(args, "query")?;
        let results = self
            .client
            .search(query, self.default_limit)
            .await
            .map_err(|e| ToolError::Failed(format!("Search failed: {}", e)))?;
        if results.is_empty() {
            return Ok(format!("No results found for query: {}", query));
        }
        Ok(format_organic(&results))
    }
}
