use serde::Deserialize;
use tracing::debug;

use crate::common::error::{Result, ScoutError};
use crate::infra::http_client::ensure_success;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DomainEmail {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub confidence: Option<u32>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl DomainEmail {
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{} {}", first, last).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verification {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct DomainSearchData {
    #[serde(default)]
    emails: Vec<DomainEmail>,
}

/// Client for the Hunter domain-search and email-verifier endpoints.
#[derive(Clone)]
pub struct HunterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HunterClient {
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
            .ok_or_else(|| ScoutError::Config("HUNTER_API_KEY environment variable is not set".into()))
    }

    pub async fn domain_search(&self, domain: &str, limit: u32) -> Result<Vec<DomainEmail>> {
        debug!("Hunter domain search: {}", domain);
        let limit = limit.to_string();
        let resp = self
            .http
            .get(format!("{}/domain-search", self.base_url))
            .query(&[("domain", domain), ("limit", limit.as_str()), ("api_key", self.key()?)])
            .send()
            .await?;
        let body: DataEnvelope<DomainSearchData> = ensure_success(resp).await?.json().await?;
        Ok(body.data.emails)
    }

    pub async fn verify(&self, email: &str) -> Result<Verification> {
        debug!("Hunter verification: {}", email);
        let resp = self
            .http
            .get(format!("{}/email-verifier", self.base_url))
            .query(&[("email", email), ("api_key", self.key()?)])
            .send()
            .await?;
        let body: DataEnvelope<Verification> = ensure_success(resp).await?.json().await?;
        Ok(body.data)
    }
}

/// Reduce a URL or bare host to the domain Hunter expects.
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme.split('/').next().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase()
}
