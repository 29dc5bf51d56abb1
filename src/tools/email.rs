use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{str_arg, u32_arg, Tool, ToolError};
use crate::common::constants::HUNTER_API_KEY_ENV;
use crate::infra::hunter::{normalize_domain, DomainEmail, HunterClient, Verification};

/// Finds published addresses for a domain.
pub struct DomainSearchTool {
    client: HunterClient,
    default_limit: u32,
}

impl DomainSearchTool {
    pub fn new(client: HunterClient, default_limit: u32) -> Self {
        Self {
            client,
            default_limit,
        }
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("Unknown")
}

pub(crate) fn format_domain_emails(emails: &[DomainEmail]) -> String {
    emails
        .iter()
        .map(|email| {
            let name = email.full_name();
            format!(
                "Email: {} | Confidence: {}% | Name: {} | Position: {}",
                email.value,
                email.confidence.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
                if name.is_empty() { "Unknown" } else { name.as_str() },
                or_unknown(email.position.as_deref())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for DomainSearchTool {
    fn name(&self) -> &'static str {
        super::HUNTER_DOMAIN_SEARCH
    }

    fn description(&self) -> &'static str {
        "Finds email addresses published for a domain, with confidence score, name and \
         position. Input is the domain, e.g. festival.com."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "domain": {"type": "string", "description": "Domain or website URL"},
                "limit": {"type": "integer", "description": "Maximum emails", "default": self.default_limit}
            },
            "required": ["domain"]
        })
    }

    async fn run(&self, args: &Value) -> Result<String, ToolError> {
        if !self.client.is_configured() {
            return Err(ToolError::NotConfigured(HUNTER_API_KEY_ENV, "Hunter domain lookup"));
        }
        let domain = normalize_domain(str_arg(args, "domain")?);
        let limit = u32_arg(args, "limit", self.default_limit);
        let emails = self
            .client
            .domain_search(&domain, limit)
            .await
            .map_err(|e| ToolError::Failed(format!("Hunter lookup failed: {}", e)))?;
        if emails.is_empty() {
            return Ok(format!("No emails found for domain: {}", domain));
        }
        Ok(format_domain_emails(&emails))
    }
}

/// Checks deliverability of one address. Waits `delay` before every call
/// to stay inside Hunter's rate limit.
pub struct EmailVerifierTool {
    client: HunterClient,
    delay: Duration,
}

impl EmailVerifierTool {
    pub fn new(client: HunterClient, delay: Duration) -> Self {
        Self { client, delay }
    }
}

pub(crate) fn format_verification(email: &str, verification: &Verification) -> String {
    format!(
        "Email: {} | Status: {} | Score: {} | Result: {}",
        email,
        or_unknown(verification.status.as_deref()),
        verification.score.map(|s| s.to_string()).unwrap_or_else(|| "?".into()),
        or_unknown(verification.result.as_deref())
    )
}

#[async_trait]
impl Tool for EmailVerifierTool {
    fn name(&self) -> &'static str {
        super::HUNTER_EMAIL_VERIFIER
    }

    fn description(&self) -> &'static str {
        "Verifies whether an email address is deliverable. Input is the email address."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"email": {"type": "string", "description": "Address to verify"}},
            "required": ["email"]
        })
    }

    async fn run(&self, args: &Value) -> Result<String, ToolError> {
        if !self.client.is_configured() {
            return Err(ToolError::NotConfigured(HUNTER_API_KEY_ENV, "email verification"));
        }
        let email = str_arg(args, "email")?;
        tokio::time::sleep(self.delay).await;
        let verification = self
            .client
            .verify(email)
            .await
            .map_err(|e| ToolError::Failed(format!("Hunter verification failed: {}", e)))?;
        Ok(format_verification(email, &verification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> HunterClient {
        HunterClient::new(reqwest::Client::new(), "http://127.0.0.1:9", None)
    }

    #[test]
    fn domain_emails_render_one_line_each() {
        let text = format_domain_emails(&[
            DomainEmail {
                value: "booking@a.jp".into(),
                confidence: Some(94),
                position: Some("Booker".into()),
                first_name: Some("Ken".into()),
                last_name: Some("Sato".into()),
            },
            DomainEmail {
                value: "info@a.jp".into(),
                confidence: None,
                position: None,
                first_name: None,
                last_name: None,
            },
        ]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Email: booking@a.jp | Confidence: 94% | Name: Ken Sato | Position: Booker"
        );
        assert_eq!(
            lines[1],
            "Email: info@a.jp | Confidence: ?% | Name: Unknown | Position: Unknown"
        );
    }

    #[test]
    fn verification_renders_status_and_score() {
        let text = format_verification(
            "booking@a.jp",
            &Verification {
                status: Some("valid".into()),
                score: Some(97),
                result: Some("deliverable".into()),
            },
        );
        assert_eq!(
            text,
            "Email: booking@a.jp | Status: valid | Score: 97 | Result: deliverable"
        );
    }

    #[tokio::test]
    async fn missing_key_skips_both_tools() {
        let search = DomainSearchTool::new(unconfigured(), 10);
        let verify = EmailVerifierTool::new(unconfigured(), Duration::from_millis(0));

        let err = search.run(&json!({"domain": "a.jp"})).await.unwrap_err();
        assert_eq!(err.to_string(), "HUNTER_API_KEY not configured, skipping Hunter domain lookup");
        let err = verify.run(&json!({"email": "x@a.jp"})).await.unwrap_err();
        assert_eq!(err.to_string(), "HUNTER_API_KEY not configured, skipping email verification");
    }

    #[tokio::test]
    async fn verifier_waits_before_calling_hunter() {
        let delay = Duration::from_millis(150);
        let client = HunterClient::new(reqwest::Client::new(), "http://127.0.0.1:9", Some("k".into()));
        let tool = EmailVerifierTool::new(client, delay);

        let started = std::time::Instant::now();
        let err = tool.run(&json!({"email": "x@a.jp"})).await.unwrap_err();
        assert!(started.elapsed() >= delay);
        assert!(err.to_string().starts_with("Hunter verification failed"));
    }

    #[tokio::test]
    async fn missing_key_returns_without_waiting() {
        let tool = EmailVerifierTool::new(unconfigured(), Duration::from_secs(5));
        let started = std::time::Instant::now();
        assert!(tool.run(&json!({"email": "x@a.jp"})).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn unreachable_api_becomes_failure_text() {
        let client = HunterClient::new(reqwest::Client::new(), "http://127.0.0.1:9", Some("k".into()));
        let tool = EmailVerifierTool::new(client, Duration::from_millis(0));
        let err = tool.run(&json!({"email": "x@a.jp"})).await.unwrap_err();
        assert!(err.to_string().starts_with("Hunter verification failed"));
    }
}
