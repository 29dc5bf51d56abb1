use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

use crate::app::ports::TaskChainRunner;
use crate::common::constants::NAME_COLUMN;
use crate::common::error::Result;
use crate::crew::CrewDefinition;
use crate::domain::{Confidence, EnrichedContactRecord};
use crate::pipeline::stage::{enrich_festival, RowOutcome};
use crate::pipeline::tabular::{merge_and_write, read_approved, MergeSummary, TableRow};

/// Progress callback: position (1-based), total, the row and its outcome
pub type RowObserver<'a> = dyn FnMut(usize, usize, &TableRow, &RowOutcome) + Send + 'a;

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentSummary {
    pub outcomes: Vec<RowOutcome>,
    pub merge: MergeSummary,
    pub output: PathBuf,
}

impl EnrichmentSummary {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn with_confidence(&self, confidence: Confidence) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.record().confidence == confidence)
            .count()
    }

    pub fn with_label(&self, label: &str) -> usize {
        self.outcomes.iter().filter(|o| o.label() == label).count()
    }
}

/// What Phase 2 did
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentReport {
    /// Nothing approved; `diagnostic` explains a missing file or gate column
    NothingApproved { diagnostic: Option<String> },
    Completed(EnrichmentSummary),
}

/// Phase 2: enrich each approved festival and write the merged table
pub struct EnrichUseCase {
    runner: Arc<dyn TaskChainRunner>,
    crew: CrewDefinition,
}

impl EnrichUseCase {
    pub fn new(runner: Arc<dyn TaskChainRunner>, crew: CrewDefinition) -> Self {
        Self { runner, crew }
    }

    /// Process approved rows of `input` one at a time. Per-row failures end
    /// up in the output table; only writing the table can fail the phase.
    pub async fn run(&self, input: &Path, output: &Path, observer: &mut RowObserver<'_>) -> Result<EnrichmentReport> {
        let gate = read_approved(input);
        let diagnostic = gate.diagnostic(input);
        let approved = gate.into_rows();
        if approved.is_empty() {
            info!("No approved festivals in {}", input.display());
            return Ok(EnrichmentReport::NothingApproved { diagnostic });
        }

        let start_time = Instant::now();
        let total = approved.len();
        info!("Enriching {} approved festivals", total);

        let mut outcomes = Vec::with_capacity(total);
        for (index, row) in approved.iter().enumerate() {
            let span = info_span!("festival", name = %row.text(NAME_COLUMN), position = index + 1);
            let outcome = enrich_festival(self.runner.as_ref(), &self.crew, row)
                .instrument(span)
                .await;
            observer(index + 1, total, row, &outcome);
            outcomes.push(outcome);
        }

        let records: Vec<EnrichedContactRecord> = outcomes.iter().map(|o| o.record().clone()).collect();
        let merge = merge_and_write(input, &records, output)?;
        info!(
            "Enrichment finished in {:.1}s: {} festivals, {} rows written",
            start_time.elapsed().as_secs_f64(),
            total,
            merge.rows_written
        );

        Ok(EnrichmentReport::Completed(EnrichmentSummary {
            outcomes,
            merge,
            output: output.to_path_buf(),
        }))
    }
}
