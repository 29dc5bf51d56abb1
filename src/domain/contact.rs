use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{nullable_string, parse_rating, Rating};

/// How much the enrichment agent trusts the contacts it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(Confidence::Low),
            Some(value) => match parse_rating(value) {
                Some(Rating::High) => Ok(Confidence::High),
                Some(Rating::Medium) => Ok(Confidence::Medium),
                Some(Rating::Low) => Ok(Confidence::Low),
                None => Err(serde::de::Error::custom(format!(
                    "confidence must be High, Medium or Low, got {:?}",
                    value
                ))),
            },
        }
    }
}

/// A named person at the festival with a way to reach them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndividualContact {
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub role: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub email: String,
}

/// Phase 2 result for one festival. Every processed row yields one of these,
/// including skips and failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContactRecord {
    pub festival_name: String,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, deserialize_with = "nullable_string")]
    pub source: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub notes: String,
    #[serde(default, deserialize_with = "nullable_contacts")]
    pub contacts: Vec<IndividualContact>,
}

fn nullable_contacts<'de, D>(deserializer: D) -> Result<Vec<IndividualContact>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<IndividualContact>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl EnrichedContactRecord {
    /// Record with no contacts and default confidence, carrying an explanation.
    pub fn placeholder(festival_name: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            festival_name: festival_name.into(),
            confidence: Confidence::Low,
            source: String::new(),
            notes: notes.into(),
            contacts: Vec::new(),
        }
    }

    /// Emails of all contacts, joined for console output.
    pub fn email_summary(&self) -> String {
        let emails: Vec<&str> = self
            .contacts
            .iter()
            .map(|c| c.email.as_str())
            .filter(|e| !e.is_empty())
            .collect();
        if emails.is_empty() {
            "None found".to_string()
        } else {
            emails.join(", ")
        }
    }
}
