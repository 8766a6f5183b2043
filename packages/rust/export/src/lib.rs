//! Tabular export of collected records.
//!
//! Every exporter writes the fixed [`COLUMNS`](notescout_shared::COLUMNS)
//! contract and always produces a file, even for an empty run.

mod csv;
mod jsonl;

use std::path::Path;

use tracing::debug;

use notescout_shared::{NoteScoutError, Record, Result};

pub use csv::CsvExporter;
pub use jsonl::JsonLinesExporter;

/// Writes an ordered record sequence to a durable file.
pub trait Exporter {
    fn export(&self, records: &[Record], path: &Path) -> Result<()>;
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    /// One JSON object per line, keyed by column name.
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "jsonl",
        }
    }

    pub fn exporter(&self) -> Box<dyn Exporter> {
        match self {
            Self::Csv => Box::new(CsvExporter),
            Self::Json => Box::new(JsonLinesExporter),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(format!("unknown export format '{other}': expected csv or json")),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Default output file name for `keyword`: `{keyword}_xiaohongshu.{ext}`.
pub fn output_file_name(keyword: &str, format: ExportFormat) -> String {
    let stem: String = keyword
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{stem}_xiaohongshu.{}", format.extension())
}

/// Write `content` next to `path` first, then rename into place.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| NoteScoutError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| NoteScoutError::Export(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&temp, content).map_err(|e| NoteScoutError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| NoteScoutError::io(path, e))?;

    debug!(path = %path.display(), size = content.len(), "wrote export file");
    Ok(())
}
