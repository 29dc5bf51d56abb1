//! Record shapes that flow between the two phases.
//!
//! Both shapes are produced by language-model agents, so deserialization is
//! lenient about absent or `null` text fields and strict about the two
//! enumerated ratings.

mod contact;
mod festival;

pub use contact::{Confidence, EnrichedContactRecord, IndividualContact};
pub use festival::{FestivalList, FestivalRecord, FitScore};

use serde::{Deserialize, Deserializer};

/// Read a string field that the model may emit as `null`.
pub(crate) fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Parse a High/Medium/Low rating, ignoring case and surrounding whitespace.
fn parse_rating(raw: &str) -> Option<Rating> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "high" => Some(Rating::High),
        "medium" => Some(Rating::Medium),
        "low" => Some(Rating::Low),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rating {
    High,
    Medium,
    Low,
}
