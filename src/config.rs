use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::common::constants::{
    DEFAULT_PHASE1_OUTPUT, DEFAULT_PHASE2_OUTPUT, FIRECRAWL_API_KEY_ENV, HUNTER_API_KEY_ENV,
    OPENAI_API_KEY_ENV, SERPER_API_KEY_ENV,
};
use crate::common::error::{Result, ScoutError};

/// Runtime configuration. Every section is optional in the TOML file and
/// falls back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub discovery: DiscoveryConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Tool-call round trips allowed per task before a final answer is forced
    pub max_tool_rounds: usize,
    /// Longest tool result fed back to the model, in characters
    pub max_tool_output_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            timeout_seconds: 120,
            max_tool_rounds: 12,
            max_tool_output_chars: 6000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub firecrawl_base_url: String,
    pub hunter_base_url: String,
    pub serper_base_url: String,
    /// Timeout for plain API calls (search, hunter)
    pub http_timeout_seconds: u64,
    /// Hard wall-clock limit for a single scrape
    pub scrape_timeout_seconds: u64,
    /// Courtesy delay before each email verification call
    pub verify_delay_ms: u64,
    pub search_limit: u32,
    pub domain_search_limit: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            firecrawl_base_url: "https://api.firecrawl.dev/v1".to_string(),
            hunter_base_url: "https://api.hunter.io/v2".to_string(),
            serper_base_url: "https://google.serper.dev".to_string(),
            http_timeout_seconds: 10,
            scrape_timeout_seconds: 20,
            verify_delay_ms: 1000,
            search_limit: 5,
            domain_search_limit: 10,
        }
    }
}

impl ToolsConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_seconds)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

/// Fixed inputs for the discovery chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub target_year: String,
    pub regions: String,
    pub genre_focus: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_year: "2026".to_string(),
            regions: "Asia (Japan, South Korea, Thailand, Philippines, Indonesia, Taiwan, \
                      India, Vietnam, Malaysia, Singapore, Hong Kong, China, and more)"
                .to_string(),
            genre_focus: "indie pop, dream pop, shoegaze, synth-pop, chillwave, indie folk, \
                          indie electronic, bedroom pop, indie rock, lo-fi"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub phase1_output: String,
    pub phase2_output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            phase1_output: DEFAULT_PHASE1_OUTPUT.to_string(),
            phase2_output: DEFAULT_PHASE2_OUTPUT.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path` if it exists, otherwise use defaults. Environment
    /// overrides are applied on top in both cases.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ScoutError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!("Loaded configuration from {}", path.display());
            Self::from_toml(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("FEST_SCOUT_MODEL") {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
        if let Ok(endpoint) = std::env::var("FEST_SCOUT_LLM_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.llm.endpoint = endpoint;
            }
        }
    }
}

/// API keys read from the environment. A missing key disables the matching
/// tool without failing the run.
#[derive(Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub firecrawl_api_key: Option<String>,
    pub hunter_api_key: Option<String>,
    pub serper_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: read_key(OPENAI_API_KEY_ENV),
            firecrawl_api_key: read_key(FIRECRAWL_API_KEY_ENV),
            hunter_api_key: read_key(HUNTER_API_KEY_ENV),
            serper_api_key: read_key(SERPER_API_KEY_ENV),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |key: &Option<String>| if key.is_some() { "set" } else { "unset" };
        f.debug_struct("Secrets")
            .field("openai_api_key", &mark(&self.openai_api_key))
            .field("firecrawl_api_key", &mark(&self.firecrawl_api_key))
            .field("hunter_api_key", &mark(&self.hunter_api_key))
            .field("serper_api_key", &mark(&self.serper_api_key))
            .finish()
    }
}

fn read_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.tools.scrape_timeout_seconds, 20);
        assert_eq!(config.tools.verify_delay_ms, 1000);
        assert_eq!(config.paths.phase1_output, DEFAULT_PHASE1_OUTPUT);
        assert_eq!(config.discovery.target_year, "2026");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [discovery]
            target_year = "2027"

            [tools]
            search_limit = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.discovery.target_year, "2027");
        assert!(config.discovery.genre_focus.contains("shoegaze"));
        assert_eq!(config.tools.search_limit, 8);
        assert_eq!(config.tools.domain_search_limit, 10);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(AppConfig::from_toml("[llm\nmodel = 3").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.paths.phase2_output, DEFAULT_PHASE2_OUTPUT);
    }

    #[test]
    fn secrets_debug_hides_values() {
        let secrets = Secrets {
            hunter_api_key: Some("hunter-secret".into()),
            ..Secrets::default()
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("hunter-secret"));
        assert!(rendered.contains("set"));
    }
}
