use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{MergeError, Result};
use crate::types::{FacilityRecord, RecordSet};

/// A facility table plus the digest of the bytes it was parsed from
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub records: RecordSet,
    pub sha256: String,
}

/// Read a facility table from a CSV file.
///
/// Headers are trimmed and lowercased (a leading BOM is dropped), cell values
/// trimmed, and blank cells treated as missing. Rows shorter than the header
/// are padded with missing values; extra cells are ignored.
pub fn read_record_set(source_name: &str, path: &Path) -> Result<LoadedTable> {
    if !path.is_file() {
        return Err(MergeError::source_unavailable(source_name, path, "file not found"));
    }
    let unavailable = |e: String| MergeError::source_unavailable(source_name, path, e);
    let bytes = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let records = parse_record_set(bytes.as_slice()).map_err(|e| unavailable(e.to_string()))?;
    info!(
        source = %source_name,
        path = %path.display(),
        rows = records.len(),
        columns = records.columns.len(),
        "Loaded CSV"
    );
    Ok(LoadedTable { records, sha256 })
}

/// Parse a facility table from any reader
pub fn parse_record_set<R: Read>(reader: R) -> Result<RecordSet> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = csv
        .headers()?
        .iter()
        .map(clean_column_name)
        .collect();

    let mut records = Vec::new();
    for (i, row) in csv.records().enumerate() {
        let row = row?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            debug!(row = i + 1, "Skipping blank row");
            continue;
        }
        let record = FacilityRecord::from_pairs(
            columns
                .iter()
                .zip(row.iter())
                .filter(|(column, _)| !column.is_empty())
                .map(|(column, cell)| (column.clone(), cell.to_string())),
        );
        records.push(record);
    }

    Ok(RecordSet::new(
        columns.into_iter().filter(|c| !c.is_empty()).collect(),
        records,
    ))
}

fn clean_column_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}
