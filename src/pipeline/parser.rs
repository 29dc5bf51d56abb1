//! Extraction of records from agent output.
//!
//! Agents are asked for JSON but often wrap it in prose or markdown fences.
//! This module is the only place that digs records out of free text. It
//! never fails: anything it cannot read becomes an empty result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::app::ports::{AgentOutput, ChainOutput};
use crate::common::constants::truncate_chars;
use crate::domain::{FestivalList, FestivalRecord};
use crate::observability::metrics;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is valid")
});

/// A wrapper object holding a list of records under one field.
pub trait RecordList: DeserializeOwned {
    type Record: DeserializeOwned;
    /// Field holding the list when the output is an object
    const LIST_FIELD: &'static str;

    fn into_records(self) -> Vec<Self::Record>;
}

impl RecordList for FestivalList {
    type Record = FestivalRecord;
    const LIST_FIELD: &'static str = "festivals";

    fn into_records(self) -> Vec<FestivalRecord> {
        self.festivals
    }
}

/// Fenced block contents in order of appearance, then the whole text.
fn candidates(text: &str) -> impl Iterator<Item = &str> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .chain(std::iter::once(text.trim()))
        .filter(|candidate| !candidate.is_empty())
}

fn records_from_value<L: RecordList>(value: Value) -> Option<Vec<L::Record>> {
    match value {
        Value::Array(_) => serde_json::from_value::<Vec<L::Record>>(value)
            .map_err(|e| debug!("Array did not match record schema: {}", e))
            .ok(),
        Value::Object(ref map) if map.contains_key(L::LIST_FIELD) => serde_json::from_value::<L>(value)
            .map(RecordList::into_records)
            .map_err(|e| debug!("Object did not match record schema: {}", e))
            .ok(),
        _ => None,
    }
}

fn records_from_text<L: RecordList>(text: &str) -> Option<Vec<L::Record>> {
    candidates(text).find_map(|candidate| {
        serde_json::from_str::<Value>(candidate)
            .ok()
            .and_then(records_from_value::<L>)
    })
}

/// Zero or more validated records from a list-shaped agent output.
pub fn parse_records<L: RecordList>(output: AgentOutput<L>) -> Vec<L::Record> {
    let records = match output {
        AgentOutput::Structured(list) => list.into_records(),
        AgentOutput::RawText(text) => records_from_text::<L>(&text).unwrap_or_else(|| {
            warn!(
                "No parseable records in agent output: {}",
                truncate_chars(text.trim(), 200)
            );
            Vec::new()
        }),
    };
    metrics::parser::records_extracted(records.len());
    records
}

/// Records from a chain run. The structured value is read the same way as
/// text candidates, so a bare array counts as the list; the raw answer is
/// the fallback.
pub fn records_from_chain<L: RecordList>(output: ChainOutput) -> Vec<L::Record> {
    let ChainOutput { raw, structured } = output;
    match structured.and_then(records_from_value::<L>) {
        Some(records) => {
            metrics::parser::records_extracted(records.len());
            records
        }
        None => parse_records::<L>(AgentOutput::RawText(raw)),
    }
}

/// A single validated record from an object-shaped agent output.
pub fn parse_record<T: DeserializeOwned>(output: AgentOutput<T>) -> Option<T> {
    match output {
        AgentOutput::Structured(record) => Some(record),
        AgentOutput::RawText(text) => {
            let parsed = candidates(&text).find_map(|candidate| serde_json::from_str::<T>(candidate).ok());
            if parsed.is_none() {
                warn!(
                    "No parseable record in agent output: {}",
                    truncate_chars(text.trim(), 200)
                );
            }
            parsed
        }
    }
}
