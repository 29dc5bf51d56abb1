use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::common::constants::truncate_chars;
use crate::common::error::{Result, ScoutError};

const FEST_SCOUT_USER_AGENT: &str = concat!("fest_scout/", env!("CARGO_PKG_VERSION"));

/// Shared client for API adapters. Every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(FEST_SCOUT_USER_AGENT));
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Turn a non-2xx response into an error that keeps the body for diagnosis.
pub async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ScoutError::Api {
        message: format!("HTTP {}: {}", status, truncate_chars(body.trim(), 300)),
    })
}
