//! One agent-chain invocation per stage, normalized into domain records.

use tracing::{info, warn};

use crate::app::ports::{TaskChainRunner, TaskInputs};
use crate::common::constants::{truncate_chars, MAX_NOTE_CHARS, NAME_COLUMN};
use crate::common::error::Result;
use crate::config::DiscoveryConfig;
use crate::crew::CrewDefinition;
use crate::domain::{EnrichedContactRecord, FestivalList, FestivalRecord};
use crate::observability::metrics;
use crate::pipeline::parser::{parse_record, records_from_chain};
use crate::pipeline::tabular::TableRow;

pub const NO_WEBSITE_NOTE: &str = "No website available for contact lookup";

fn inputs<const N: usize>(pairs: [(&str, &str); N]) -> TaskInputs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Run the discovery and scoring chain once. A chain failure is returned;
/// unreadable output is an empty list.
pub async fn discover_festivals(
    runner: &dyn TaskChainRunner,
    crew: &CrewDefinition,
    discovery: &DiscoveryConfig,
) -> Result<Vec<FestivalRecord>> {
    let inputs = inputs([
        ("target_year", discovery.target_year.as_str()),
        ("regions", discovery.regions.as_str()),
        ("genre_focus", discovery.genre_focus.as_str()),
    ]);
    let output = runner.kickoff(crew, &inputs).await?;
    Ok(records_from_chain::<FestivalList>(output))
}

/// How one approved row came out of Phase 2. Every variant carries the
/// record that goes into the output table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Enriched(EnrichedContactRecord),
    /// The chain answered but no record could be read from it
    Unparsed(EnrichedContactRecord),
    /// No website, so no external call was made
    Skipped(EnrichedContactRecord),
    Failed(EnrichedContactRecord),
}

impl RowOutcome {
    pub fn record(&self) -> &EnrichedContactRecord {
        match self {
            RowOutcome::Enriched(r) | RowOutcome::Unparsed(r) | RowOutcome::Skipped(r) | RowOutcome::Failed(r) => r,
        }
    }

    pub fn into_record(self) -> EnrichedContactRecord {
        match self {
            RowOutcome::Enriched(r) | RowOutcome::Unparsed(r) | RowOutcome::Skipped(r) | RowOutcome::Failed(r) => r,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RowOutcome::Enriched(_) => "enriched",
            RowOutcome::Unparsed(_) => "unparsed",
            RowOutcome::Skipped(_) => "skipped",
            RowOutcome::Failed(_) => "failed",
        }
    }
}

/// Enrich one approved row. Never fails: every error becomes a placeholder
/// record explaining what went wrong.
pub async fn enrich_festival(runner: &dyn TaskChainRunner, crew: &CrewDefinition, row: &TableRow) -> RowOutcome {
    let name = row.text(NAME_COLUMN);
    let website = row.text("website");

    if website.is_empty() {
        warn!("No website for {}, skipping enrichment", name);
        metrics::enrich::row_skipped();
        return RowOutcome::Skipped(EnrichedContactRecord::placeholder(name, NO_WEBSITE_NOTE));
    }

    let inputs = inputs([
        ("festival_name", name),
        ("website", website),
        ("country", row.text("country")),
        ("location", row.text("location")),
    ]);

    let output = match runner.kickoff(crew, &inputs).await {
        Ok(output) => output,
        Err(e) => {
            warn!("Enrichment chain failed for {}: {}", name, e);
            metrics::enrich::row_failed();
            let error = e.to_string();
            return RowOutcome::Failed(EnrichedContactRecord::placeholder(
                name,
                format!("Enrichment failed: {}", truncate_chars(&error, MAX_NOTE_CHARS)),
            ));
        }
    };

    let raw = output.raw.clone();
    match parse_record::<EnrichedContactRecord>(output.into_agent_output()) {
        Some(mut record) => {
            // The stage-1 name is the join key, whatever the model called it.
            if record.festival_name.trim() != name {
                info!("Model named {:?} as {:?}", name, record.festival_name);
                record.festival_name = name.to_string();
            }
            metrics::enrich::row_enriched();
            RowOutcome::Enriched(record)
        }
        None => {
            metrics::enrich::row_unparsed();
            RowOutcome::Unparsed(EnrichedContactRecord::placeholder(
                name,
                format!(
                    "Could not parse structured output. Raw: {}",
                    truncate_chars(&raw, MAX_NOTE_CHARS)
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ChainOutput;
    use crate::common::error::ScoutError;
    use crate::domain::{Confidence, FitScore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns one fixed result and remembers the inputs it was given.
    struct FixedRunner {
        result: std::result::Result<ChainOutput, String>,
        calls: Mutex<Vec<TaskInputs>>,
    }

    impl FixedRunner {
        fn ok(output: ChainOutput) -> Self {
            Self {
                result: Ok(output),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TaskChainRunner for FixedRunner {
        async fn kickoff(&self, _crew: &CrewDefinition, inputs: &TaskInputs) -> Result<ChainOutput> {
            self.calls.lock().unwrap().push(inputs.clone());
            self.result.clone().map_err(ScoutError::agent)
        }
    }

    fn row(name: &str, website: &str) -> TableRow {
        TableRow::from_pairs([("name", name), ("website", website), ("country", "Japan"), ("location", "Naeba"), ("Approved", "yes")])
    }

    #[tokio::test]
    async fn discovery_parses_fenced_output() {
        let runner = FixedRunner::ok(ChainOutput::text(
            "```json\n{\"festivals\":[{\"name\":\"A\",\"genre_fit_score\":\"High\"}]}\n```",
        ));
        let crew = CrewDefinition::research().unwrap();
        let records = discover_festivals(&runner, &crew, &DiscoveryConfig::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].genre_fit_score, Some(FitScore::High));
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].get("target_year").map(String::as_str), Some("2026"));
    }

    #[tokio::test]
    async fn discovery_accepts_a_converted_bare_array() {
        let runner = FixedRunner::ok(ChainOutput {
            raw: "Wonderfruit looks like a Medium fit.".into(),
            structured: Some(json!([{"name": "Wonderfruit", "genre_fit_score": "Medium"}])),
        });
        let crew = CrewDefinition::research().unwrap();
        let records = discover_festivals(&runner, &crew, &DiscoveryConfig::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Wonderfruit");
        assert_eq!(records[0].genre_fit_score, Some(FitScore::Medium));
    }

    #[tokio::test]
    async fn discovery_failure_propagates() {
        let runner = FixedRunner::failing("rate limited");
        let crew = CrewDefinition::research().unwrap();
        assert!(discover_festivals(&runner, &crew, &DiscoveryConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn empty_website_skips_without_calling_the_chain() {
        let runner = FixedRunner::failing("must not be called");
        let crew = CrewDefinition::enrichment().unwrap();
        let outcome = enrich_festival(&runner, &crew, &row("A", "  ")).await;
        assert!(matches!(outcome, RowOutcome::Skipped(_)));
        assert_eq!(outcome.record().notes, NO_WEBSITE_NOTE);
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn structured_record_keeps_the_table_name() {
        let runner = FixedRunner::ok(ChainOutput {
            raw: "done".into(),
            structured: Some(json!({
                "festival_name": "FUJI ROCK FESTIVAL",
                "confidence": "High",
                "source": "https://fujirock.jp/contact",
                "contacts": [{"name": "Aiko", "role": "Booker", "email": "aiko@fujirock.jp"}]
            })),
        });
        let crew = CrewDefinition::enrichment().unwrap();
        let outcome = enrich_festival(&runner, &crew, &row("Fuji Rock", "https://fujirock.jp")).await;
        let record = outcome.into_record();
        assert_eq!(record.festival_name, "Fuji Rock");
        assert_eq!(record.confidence, Confidence::High);
        assert_eq!(record.email_summary(), "aiko@fujirock.jp");
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].get("website").map(String::as_str), Some("https://fujirock.jp"));
    }

    #[tokio::test]
    async fn prose_output_becomes_unparsed_note() {
        let prose = "I searched everywhere. ".repeat(20);
        let runner = FixedRunner::ok(ChainOutput::text(prose.clone()));
        let crew = CrewDefinition::enrichment().unwrap();
        let outcome = enrich_festival(&runner, &crew, &row("A", "https://a.jp")).await;
        assert_eq!(outcome.label(), "unparsed");
        let notes = &outcome.record().notes;
        assert!(notes.starts_with("Could not parse structured output. Raw: I searched"));
        assert_eq!(notes.chars().count(), "Could not parse structured output. Raw: ".len() + MAX_NOTE_CHARS);
    }

    #[tokio::test]
    async fn chain_error_becomes_failed_note() {
        let runner = FixedRunner::failing("upstream 502");
        let crew = CrewDefinition::enrichment().unwrap();
        let outcome = enrich_festival(&runner, &crew, &row("A", "https://a.jp")).await;
        assert!(matches!(outcome, RowOutcome::Failed(_)));
        assert_eq!(outcome.record().notes, "Enrichment failed: Agent runtime error: upstream 502");
        assert_eq!(outcome.record().confidence, Confidence::Low);
    }
}
