//! The flat-file hand-off between the two phases.
//!
//! Phase 1 writes festivals with an empty `Approved` column. A person marks
//! rows `yes` in a spreadsheet; Phase 2 reads only those rows back and later
//! writes the enriched table joined against the original one.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::common::constants::{
    CONTACT_DATA_DISCLAIMER, ENRICHMENT_COLUMNS, FESTIVAL_COLUMNS, GATE_APPROVED_VALUE,
    GATE_COLUMN, NAME_COLUMN,
};
use crate::common::error::{Result, ScoutError};
use crate::domain::{EnrichedContactRecord, FestivalRecord, IndividualContact};

/// One loosely typed table row: column names and values in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    cells: Vec<(String, String)>,
}

impl TableRow {
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            cells: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Value of `column`, trimmed, empty when the column is absent.
    pub fn text(&self, column: &str) -> &str {
        self.get(column).map(str::trim).unwrap_or("")
    }

    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }
}

/// Result of reading the approved rows. Every variant other than `Approved`
/// means "nothing to do"; none of them is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum GateRead {
    Approved(Vec<TableRow>),
    MissingFile,
    MissingGateColumn,
    Unreadable(String),
}

impl GateRead {
    pub fn into_rows(self) -> Vec<TableRow> {
        match self {
            GateRead::Approved(rows) => rows,
            _ => Vec::new(),
        }
    }

    /// Operator-facing explanation for the empty variants.
    pub fn diagnostic(&self, path: &Path) -> Option<String> {
        match self {
            GateRead::Approved(_) => None,
            GateRead::MissingFile => Some(format!("CSV file not found at {}", path.display())),
            GateRead::MissingGateColumn => Some(format!(
                "'{}' column not found in {}. Add an '{}' column and mark entries with 'Yes' to include them in Phase 2.",
                GATE_COLUMN,
                path.display(),
                GATE_COLUMN
            )),
            GateRead::Unreadable(reason) => Some(format!("Could not read {}: {}", path.display(), reason)),
        }
    }
}

struct Table {
    headers: Vec<String>,
    rows: Vec<TableRow>,
}

fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)?;
    // Spreadsheet tools like to prepend a byte-order mark.
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.clone(), record.get(idx).unwrap_or("").to_string()))
            .collect();
        rows.push(TableRow { cells });
    }
    Ok(Table { headers, rows })
}

fn to_csv_bytes(headers: &[&str], rows: &[Vec<&str>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ScoutError::Io(e.into_error()))
}

/// Write festivals with the stage-1 header and an empty gate column.
/// Replaces any existing file; zero records still yields a header line.
pub fn write_with_gate(path: &Path, records: &[FestivalRecord]) -> Result<()> {
    let mut headers: Vec<&str> = FESTIVAL_COLUMNS.to_vec();
    headers.push(GATE_COLUMN);

    let rows: Vec<Vec<&str>> = records
        .iter()
        .map(|record| {
            let mut row = record.column_values().to_vec();
            row.push("");
            row
        })
        .collect();

    fs::write(path, to_csv_bytes(&headers, &rows)?)?;
    info!("Saved {} festivals to {}", records.len(), path.display());
    Ok(())
}

/// Rows whose gate value, trimmed and case-folded, is `yes`.
pub fn read_approved(path: &Path) -> GateRead {
    if !path.exists() {
        warn!("Stage-1 table not found at {}", path.display());
        return GateRead::MissingFile;
    }
    let table = match read_table(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("Could not read stage-1 table {}: {}", path.display(), e);
            return GateRead::Unreadable(e.to_string());
        }
    };
    if !table.headers.iter().any(|h| h == GATE_COLUMN) {
        warn!("No '{}' column in {}", GATE_COLUMN, path.display());
        return GateRead::MissingGateColumn;
    }

    let approved: Vec<TableRow> = table
        .rows
        .into_iter()
        .filter(|row| row.text(GATE_COLUMN).to_lowercase() == GATE_APPROVED_VALUE)
        .collect();
    info!("Loaded {} approved festivals from {}", approved.len(), path.display());
    GateRead::Approved(approved)
}

/// What `merge_and_write` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub rows_written: usize,
    /// Enrichment records with no stage-1 row of the same name
    pub unmatched: usize,
    /// True when the original table could not be used and only the
    /// enrichment columns were written
    pub standalone: bool,
}

/// Contacts expanded to one row each; a record with none still gets one.
fn contact_rows(record: &EnrichedContactRecord) -> Vec<Option<&IndividualContact>> {
    if record.contacts.is_empty() {
        vec![None]
    } else {
        record.contacts.iter().map(Some).collect()
    }
}

fn enrichment_cells<'a>(record: &'a EnrichedContactRecord, contact: Option<&'a IndividualContact>) -> [&'a str; 6] {
    [
        record.confidence.as_str(),
        &record.source,
        &record.notes,
        contact.map(|c| c.name.as_str()).unwrap_or(""),
        contact.map(|c| c.role.as_str()).unwrap_or(""),
        contact.map(|c| c.email.as_str()).unwrap_or(""),
    ]
}

fn load_original(path: &Path) -> Option<Table> {
    match read_table(path) {
        Ok(table) if table.rows.is_empty() => {
            warn!("Original table {} has no rows, writing enrichment columns only", path.display());
            None
        }
        Ok(table) if !table.headers.iter().any(|h| h == NAME_COLUMN) => {
            warn!("Original table {} has no '{}' column, writing enrichment columns only", path.display(), NAME_COLUMN);
            None
        }
        Ok(table) => Some(table),
        Err(e) => {
            warn!("Could not read original table {}: {}, writing enrichment columns only", path.display(), e);
            None
        }
    }
}

/// Expand, join against `original` by name and write to `output`, followed
/// by the contact-data disclaimer. Output has Σ max(contacts, 1) data rows.
pub fn merge_and_write(original: &Path, records: &[EnrichedContactRecord], output: &Path) -> Result<MergeSummary> {
    let table = load_original(original);
    let base_headers: Vec<&str> = match &table {
        Some(table) => table
            .headers
            .iter()
            .map(String::as_str)
            .filter(|h| !ENRICHMENT_COLUMNS.contains(h))
            .collect(),
        None => vec![NAME_COLUMN],
    };

    let mut headers = base_headers.clone();
    headers.extend(ENRICHMENT_COLUMNS);

    let mut rows: Vec<Vec<&str>> = Vec::new();
    let mut unmatched = 0;
    for record in records {
        let festival_name = record.festival_name.trim();
        let matched = table
            .as_ref()
            .and_then(|t| t.rows.iter().find(|row| row.text(NAME_COLUMN) == festival_name));
        if matched.is_none() {
            unmatched += 1;
            if table.is_some() {
                debug!("No stage-1 row named '{}'", festival_name);
            }
        }

        for contact in contact_rows(record) {
            let mut row: Vec<&str> = base_headers
                .iter()
                .map(|&column| match matched.and_then(|m| m.get(column)) {
                    Some(value) => value,
                    None if column == NAME_COLUMN => record.festival_name.as_str(),
                    None => "",
                })
                .collect();
            row.extend(enrichment_cells(record, contact));
            rows.push(row);
        }
    }

    let mut bytes = to_csv_bytes(&headers, &rows)?;
    bytes.extend_from_slice(format!("\n{}\n", CONTACT_DATA_DISCLAIMER).as_bytes());
    fs::write(output, bytes)?;

    let summary = MergeSummary {
        rows_written: rows.len(),
        unmatched,
        standalone: table.is_none(),
    };
    info!(
        "Saved enriched data for {} festivals ({} rows) to {}",
        records.len(),
        summary.rows_written,
        output.display()
    );
    Ok(summary)
}
