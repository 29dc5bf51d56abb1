use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::app::ports::TaskChainRunner;
use crate::common::error::Result;
use crate::config::DiscoveryConfig;
use crate::crew::CrewDefinition;
use crate::domain::{FestivalRecord, FitScore};
use crate::pipeline::stage::discover_festivals;
use crate::pipeline::tabular::write_with_gate;

/// Counts reported at the end of Phase 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unscored: usize,
    pub output: PathBuf,
}

impl DiscoverySummary {
    fn from_records(records: &[FestivalRecord], output: &Path) -> Self {
        let count = |score: Option<FitScore>| records.iter().filter(|r| r.genre_fit_score == score).count();
        Self {
            total: records.len(),
            high: count(Some(FitScore::High)),
            medium: count(Some(FitScore::Medium)),
            low: count(Some(FitScore::Low)),
            unscored: count(None),
            output: output.to_path_buf(),
        }
    }
}

/// Phase 1: discover and score festivals, then write them for review
pub struct DiscoverUseCase {
    /// Chain runner for the research crew
    runner: Arc<dyn TaskChainRunner>,
    crew: CrewDefinition,
}

impl DiscoverUseCase {
    pub fn new(runner: Arc<dyn TaskChainRunner>, crew: CrewDefinition) -> Self {
        Self { runner, crew }
    }

    /// Run the research chain once and write the gated table. A chain
    /// failure is returned before anything touches `output`.
    pub async fn run(&self, discovery: &DiscoveryConfig, output: &Path) -> Result<DiscoverySummary> {
        let start_time = Instant::now();
        info!(
            "Starting festival discovery for {} in {}",
            discovery.target_year, discovery.regions
        );

        let records = match discover_festivals(self.runner.as_ref(), &self.crew, discovery).await {
            Ok(records) => records,
            Err(e) => {
                error!("Research chain failed: {}", e);
                return Err(e);
            }
        };
        if records.is_empty() {
            info!("No festivals found in crew output, writing an empty table");
        }

        write_with_gate(output, &records)?;
        let summary = DiscoverySummary::from_records(&records, output);
        info!(
            "Discovery finished in {:.1}s: {} festivals ({} high, {} medium, {} low)",
            start_time.elapsed().as_secs_f64(),
            summary.total,
            summary.high,
            summary.medium,
            summary.low
        );
        Ok(summary)
    }
}
