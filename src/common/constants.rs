//! File names and column names shared by both phases.
//! The stage-1 table is hand-edited between runs, so these names are part of
//! the on-disk contract and must not drift.

// Default table locations
pub const DEFAULT_PHASE1_OUTPUT: &str = "festivals_phase1.csv";
pub const DEFAULT_PHASE2_OUTPUT: &str = "festivals_phase2_enriched.csv";
pub const DEFAULT_CONFIG_PATH: &str = "fest_scout.toml";

// Human-edited gate column and the value that lets a row through
pub const GATE_COLUMN: &str = "Approved";
pub const GATE_APPROVED_VALUE: &str = "yes";

/// Join key shared by both tables
pub const NAME_COLUMN: &str = "name";

/// Stage-1 columns in output order, gate excluded
pub const FESTIVAL_COLUMNS: [&str; 11] = [
    "name",
    "country",
    "location",
    "dates",
    "genres",
    "website",
    "description",
    "genre_fit_score",
    "why_it_fits",
    "known_acts",
    "submission_info",
];

// Columns appended by the enrichment phase
pub const CONFIDENCE_COLUMN: &str = "Confidence";
pub const SOURCE_COLUMN: &str = "Source";
pub const NOTES_COLUMN: &str = "Notes";
pub const CONTACT_NAME_COLUMN: &str = "Contact Name";
pub const CONTACT_ROLE_COLUMN: &str = "Contact Role";
pub const CONTACT_EMAIL_COLUMN: &str = "Contact Email";

pub const ENRICHMENT_COLUMNS: [&str; 6] = [
    CONFIDENCE_COLUMN,
    SOURCE_COLUMN,
    NOTES_COLUMN,
    CONTACT_NAME_COLUMN,
    CONTACT_ROLE_COLUMN,
    CONTACT_EMAIL_COLUMN,
];

/// Trailing comment appended after the stage-2 data rows
pub const CONTACT_DATA_DISCLAIMER: &str = "# IMPORTANT: This data is provided for legitimate music industry outreach only. \
Comply with all applicable privacy laws (GDPR, CAN-SPAM, etc.) when contacting individuals. \
Verify all contact details before use.";

/// Longest diagnostic carried into a placeholder row's notes
pub const MAX_NOTE_CHARS: usize = 200;

// Environment variable names for secrets
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const FIRECRAWL_API_KEY_ENV: &str = "FIRECRAWL_API_KEY";
pub const HUNTER_API_KEY_ENV: &str = "HUNTER_API_KEY";
pub const SERPER_API_KEY_ENV: &str = "SERPER_API_KEY";

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
