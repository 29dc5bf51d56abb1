use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::common::error::{Result, ScoutError};
use crate::infra::http_client::ensure_success;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope {
    fn into_data(self) -> Result<Value> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ScoutError::Api {
                message: self
                    .error
                    .unwrap_or_else(|| "Firecrawl reported failure".to_string()),
            })
        }
    }
}

/// Client for the Firecrawl search and scrape endpoints.
#[derive(Clone)]
pub struct FirecrawlClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FirecrawlClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ScoutError::Config("FIRECRAWL_API_KEY environment variable is not set".into()))
    }

    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        debug!("Firecrawl search: {}", query);
        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(self.key()?)
            .json(&json!({ "query": query, "limit": limit }))
            .send()
            .await?;
        let envelope: Envelope = ensure_success(resp).await?.json().await?;
        parse_search_data(envelope.into_data()?)
    }

    /// Markdown rendering of a page; empty when the page had no content.
    pub async fn scrape_markdown(&self, url: &str) -> Result<String> {
        debug!("Firecrawl scrape: {}", url);
        let resp = self
            .http
            .post(format!("{}/scrape", self.base_url))
            .bearer_auth(self.key()?)
            .json(&json!({ "url": url, "formats": ["markdown"] }))
            .send()
            .await?;
        let envelope: Envelope = ensure_success(resp).await?.json().await?;
        let data = envelope.into_data()?;
        Ok(data
            .get("markdown")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// Search results arrive either as a bare list or grouped under `web`.
fn parse_search_data(data: Value) -> Result<Vec<SearchHit>> {
    let list = match data {
        Value::Array(_) => data,
        Value::Object(mut map) => map.remove("web").unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => {
            return Err(ScoutError::Api {
                message: format!("unexpected search payload: {}", other),
            })
        }
    };
    Ok(serde_json::from_value(list)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_data_accepts_bare_list() {
        let hits = parse_search_data(json!([
            {"url": "https://summersonic.com", "title": "Summer Sonic", "description": "Tokyo/Osaka"}
        ]))
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title.as_deref(), Some("Summer Sonic"));
    }

    #[test]
    fn search_data_accepts_grouped_results() {
        let hits = parse_search_data(json!({"web": [{"url": "https://a.jp"}]})).unwrap();
        assert_eq!(hits[0].url, "https://a.jp");
        assert_eq!(hits[0].title, None);
    }

    #[test]
    fn failed_envelope_carries_error() {
        let envelope = Envelope {
            success: false,
            data: Value::Null,
            error: Some("rate limited".into()),
        };
        let err = envelope.into_data().unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_to_call() {
        let client = FirecrawlClient::new(reqwest::Client::new(), "http://127.0.0.1:9", None);
        assert!(!client.is_configured());
        assert!(matches!(
            client.scrape_markdown("https://a.jp").await,
            Err(ScoutError::Config(_))
        ));
    }
}
