use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::types::RecordSet;

/// Write a table as CSV, header always present.
///
/// The file is written to a temporary sibling and renamed into place, so
/// readers never see a partial artifact.
pub fn write_record_set(path: &Path, set: &RecordSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)?;
        write_to(file, set)?;
    }
    fs::rename(&tmp, path)?;

    info!(
        path = %path.display(),
        rows = set.len(),
        columns = set.columns.len(),
        "Wrote CSV artifact"
    );
    Ok(())
}

/// Serialize a table as CSV into any writer
pub fn write_to<W: Write>(writer: W, set: &RecordSet) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(&set.columns)?;
    for record in &set.records {
        csv.write_record(set.columns.iter().map(|c| record.get_or_empty(c)))?;
    }
    csv.flush()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
