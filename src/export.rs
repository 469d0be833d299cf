//! CSV export of result sets
//!
//! Output opens cleanly in spreadsheet tools: UTF-8 BOM, header row, fields
//! quoted only when they contain a delimiter or quote.

use crate::error::{AssistantError, Result};
use crate::mock_data::ResultSet;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn export_file_name(date: NaiveDate) -> String {
    format!("query_results_{}.csv", date.format("%Y-%m-%d"))
}

/// Write `results` as CSV. Returns false and writes nothing for an empty set.
/// Records are separated by `\n` with no newline after the last one.
pub fn write_csv<W: Write>(results: &ResultSet, mut writer: W) -> Result<bool> {
    if results.is_empty() {
        return Ok(false);
    }

    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    csv_writer.write_record(&results.columns)?;
    for row in &results.rows {
        csv_writer.write_record(row)?;
    }
    let mut bytes = csv_writer
        .into_inner()
        .map_err(|e| AssistantError::Io(e.into_error()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }

    writer.write_all(UTF8_BOM)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(true)
}

/// Export into `dir` under today's dated file name
pub fn export_to_dir(results: &ResultSet, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    export_to_dir_dated(results, dir, chrono::Local::now().date_naive())
}

pub fn export_to_dir_dated(
    results: &ResultSet,
    dir: impl AsRef<Path>,
    date: NaiveDate,
) -> Result<Option<PathBuf>> {
    if results.is_empty() {
        return Ok(None);
    }

    let path = dir.as_ref().join(export_file_name(date));
    let file = File::create(&path)?;
    write_csv(results, BufWriter::new(file))?;
    info!(" Exported {} rows to {}", results.len(), path.display());
    Ok(Some(path))
}
