use serde::Deserialize;
use serde_json::json;

use crate::common::error::{Result, ScoutError};
use crate::infra::http_client::ensure_success;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

/// Google results through the Serper API.
#[derive(Clone)]
pub struct SerperClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SerperClient {
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

    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<OrganicResult>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ScoutError::Config("SERPER_API_KEY environment variable is not set".into()))?;
        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", key)
            .json(&json!({ "q": query, "num": limit }))
            .send()
            .await?;
        let body: SearchResponse = ensure_success(resp).await?.json().await?;
        Ok(body.organic)
    }
}
