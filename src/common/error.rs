use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Crew definition error: {0}")]
    Crew(String),

    #[error("Agent runtime error: {message}")]
    Agent { message: String },

    #[error("Missing input for task template: {0}")]
    MissingInput(String),
}

impl ScoutError {
    pub fn agent(message: impl Into<String>) -> Self {
        ScoutError::Agent {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
