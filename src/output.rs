//! Output formatting for `inspect`

use crate::error::Result;
use crate::source::SourceMeta;
use std::io::Write;

/// Pretty printer for source metadata
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print each relation with its row count and columns
    pub fn print_sources(out: &mut dyn Write, sources: &[SourceMeta]) -> Result<()> {
        if sources.is_empty() {
            writeln!(out, "No tables found.")?;
            return Ok(());
        }

        for meta in sources {
            writeln!(out, "📋 {}", meta.location)?;
            writeln!(out, "├─ Rows: {}", meta.row_count)?;
            writeln!(out, "└─ Columns: {}", meta.columns.len())?;
            for (i, column) in meta.columns.iter().enumerate() {
                let prefix = if i == meta.columns.len() - 1 {
                    "   └─"
                } else {
                    "   ├─"
                };
                writeln!(out, "{} {}: {}", prefix, column.name, column.data_type)?;
            }
        }
        Ok(())
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}
