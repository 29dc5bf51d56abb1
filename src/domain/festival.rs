use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{nullable_string, parse_rating, Rating};

/// How well a festival matches the configured genre focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitScore {
    High,
    Medium,
    Low,
}

impl FitScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitScore::High => "High",
            FitScore::Medium => "Medium",
            FitScore::Low => "Low",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the three buckets.
    pub fn parse(raw: &str) -> Option<Self> {
        parse_rating(raw).map(|rating| match rating {
            Rating::High => FitScore::High,
            Rating::Medium => FitScore::Medium,
            Rating::Low => FitScore::Low,
        })
    }
}

impl fmt::Display for FitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FitScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Absent, `null` and blank all mean "not scored"; any other value must be a
/// known bucket or the whole record fails validation.
fn optional_fit_score<'de, D>(deserializer: D) -> Result<Option<FitScore>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => FitScore::parse(value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "genre_fit_score must be High, Medium or Low, got {:?}",
                value
            ))
        }),
    }
}

/// One discovered festival candidate, as written to the stage-1 table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FestivalRecord {
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub country: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub location: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub dates: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub genres: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub website: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(default, deserialize_with = "optional_fit_score")]
    pub genre_fit_score: Option<FitScore>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub why_it_fits: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub known_acts: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub submission_info: String,
}

impl FestivalRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: String::new(),
            location: String::new(),
            dates: String::new(),
            genres: String::new(),
            website: String::new(),
            description: String::new(),
            genre_fit_score: None,
            why_it_fits: String::new(),
            known_acts: String::new(),
            submission_info: String::new(),
        }
    }

    /// Field values in stage-1 column order.
    pub fn column_values(&self) -> [&str; 11] {
        [
            &self.name,
            &self.country,
            &self.location,
            &self.dates,
            &self.genres,
            &self.website,
            &self.description,
            self.genre_fit_score.map(|s| s.as_str()).unwrap_or(""),
            &self.why_it_fits,
            &self.known_acts,
            &self.submission_info,
        ]
    }
}

/// Wrapper the scoring task is asked to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FestivalList {
    pub festivals: Vec<FestivalRecord>,
}
