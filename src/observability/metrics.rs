//! Counters for the festival pipeline.
//!
//! Metric names live in one enum so call sites never carry magic strings.
//! The Prometheus recorder is installed once at start-up; its rendered text
//! can be dumped to a file at the end of a run.

use once_cell::sync::OnceCell;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Tool adapter metrics
    ToolCallsSuccess,
    ToolCallsError,
    ToolCallsSkipped,
    ToolScrapeTimeouts,

    // Agent runtime metrics
    AgentTasksCompleted,
    AgentToolRounds,
    AgentConversions,

    // Record parser metrics
    ParserRecordsExtracted,
    ParserEmptyResults,

    // Phase 2 row outcomes
    EnrichRowsEnriched,
    EnrichRowsUnparsed,
    EnrichRowsSkipped,
    EnrichRowsFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ToolCallsSuccess => "fest_scout_tool_calls_success_total",
            MetricName::ToolCallsError => "fest_scout_tool_calls_error_total",
            MetricName::ToolCallsSkipped => "fest_scout_tool_calls_skipped_total",
            MetricName::ToolScrapeTimeouts => "fest_scout_tool_scrape_timeouts_total",
            MetricName::AgentTasksCompleted => "fest_scout_agent_tasks_completed_total",
            MetricName::AgentToolRounds => "fest_scout_agent_tool_rounds_total",
            MetricName::AgentConversions => "fest_scout_agent_conversions_total",
            MetricName::ParserRecordsExtracted => "fest_scout_parser_records_extracted_total",
            MetricName::ParserEmptyResults => "fest_scout_parser_empty_results_total",
            MetricName::EnrichRowsEnriched => "fest_scout_enrich_rows_enriched_total",
            MetricName::EnrichRowsUnparsed => "fest_scout_enrich_rows_unparsed_total",
            MetricName::EnrichRowsSkipped => "fest_scout_enrich_rows_skipped_total",
            MetricName::EnrichRowsFailed => "fest_scout_enrich_rows_failed_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceCell<metrics_exporter_prometheus::PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    let _ = METRICS_HANDLE.set(handle);
    info!("Metrics recorder installed");
    Ok(())
}

/// Rendered Prometheus text, if the recorder is installed.
pub fn snapshot() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Write the snapshot to `FEST_SCOUT_METRICS_FILE` when that variable is set.
pub fn dump_if_requested() {
    let Ok(path) = std::env::var("FEST_SCOUT_METRICS_FILE") else {
        return;
    };
    let Some(text) = snapshot() else {
        return;
    };
    match std::fs::write(&path, text) {
        Ok(()) => info!("Metrics written to {}", path),
        Err(e) => warn!("Could not write metrics to {}: {}", path, e),
    }
}

// ============================================================================
// Tool Metrics
// ============================================================================

pub mod tools {
    use super::MetricName;

    pub fn call_success(tool: &'static str) {
        ::metrics::counter!(MetricName::ToolCallsSuccess.as_str(), "tool" => tool).increment(1);
    }

    pub fn call_error(tool: &'static str) {
        ::metrics::counter!(MetricName::ToolCallsError.as_str(), "tool" => tool).increment(1);
    }

    /// Tool disabled for lack of an API key
    pub fn call_skipped(tool: &'static str) {
        ::metrics::counter!(MetricName::ToolCallsSkipped.as_str(), "tool" => tool).increment(1);
    }

    pub fn scrape_timeout() {
        ::metrics::counter!(MetricName::ToolScrapeTimeouts.as_str()).increment(1);
    }
}

// ============================================================================
// Agent Metrics
// ============================================================================

pub mod agent {
    use super::MetricName;

    pub fn task_completed(task: &str) {
        ::metrics::counter!(MetricName::AgentTasksCompleted.as_str(), "task" => task.to_string())
            .increment(1);
    }

    pub fn tool_round() {
        ::metrics::counter!(MetricName::AgentToolRounds.as_str()).increment(1);
    }

    pub fn conversion_attempted() {
        ::metrics::counter!(MetricName::AgentConversions.as_str()).increment(1);
    }
}

// ============================================================================
// Parser Metrics
// ============================================================================

pub mod parser {
    use super::MetricName;

    pub fn records_extracted(count: usize) {
        if count == 0 {
            ::metrics::counter!(MetricName::ParserEmptyResults.as_str()).increment(1);
        } else {
            ::metrics::counter!(MetricName::ParserRecordsExtracted.as_str())
                .increment(count as u64);
        }
    }
}

// ============================================================================
// Enrichment Metrics
// ============================================================================

pub mod enrich {
    use super::MetricName;

    pub fn row_enriched() {
        ::metrics::counter!(MetricName::EnrichRowsEnriched.as_str()).increment(1);
    }

    pub fn row_unparsed() {
        ::metrics::counter!(MetricName::EnrichRowsUnparsed.as_str()).increment(1);
    }

    pub fn row_skipped() {
        ::metrics::counter!(MetricName::EnrichRowsSkipped.as_str()).increment(1);
    }

    pub fn row_failed() {
        ::metrics::counter!(MetricName::EnrichRowsFailed.as_str()).increment(1);
    }
}
