use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::ExportError;
use crate::store::StoredRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One JSON object per line.
    Json,
    /// Header row from the record field names.
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "jsonl" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{}' (json, csv)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

pub fn export_records(
    records: &[StoredRecord],
    format: ExportFormat,
    path: &Path,
) -> Result<usize, ExportError> {
    match format {
        ExportFormat::Json => {
            let mut out = BufWriter::new(File::create(path)?);
            for record in records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
        ExportFormat::Csv => {
            if records.is_empty() {
                return Err(ExportError::Empty);
            }
            let mut out = csv::Writer::from_path(path)?;
            for record in records {
                out.serialize(record)?;
            }
            out.flush()?;
        }
    }
    info!(records = records.len(), format = %format, path = %path.display(), "export written");
    Ok(records.len())
}
