use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use notescout_shared::{COLUMNS, NoteScoutError, Record, Result};

use crate::{Exporter, write_atomic};

/// One JSON object per record, keyed by the display column names.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesExporter;

impl Exporter for JsonLinesExporter {
    fn export(&self, records: &[Record], path: &Path) -> Result<()> {
        let mut out = String::new();
        for record in records {
            let row: Map<String, Value> = COLUMNS
                .iter()
                .zip(record.values())
                .map(|(column, value)| ((*column).to_string(), Value::from(value)))
                .collect();
            let line = serde_json::to_string(&row)
                .map_err(|e| NoteScoutError::Export(format!("failed to encode record: {e}")))?;
            out.push_str(&line);
            out.push('\n');
        }

        write_atomic(path, &out)?;
        info!(path = %path.display(), rows = records.len(), "exported JSON lines");
        Ok(())
    }
}
