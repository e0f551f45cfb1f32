//! Row-set renderers: turn a slice of rows into a text block
//!
//! Every row renders to exactly one line, so line `n` of a block is row `n`
//! of the slice. The hunk assembler relies on this to re-base line numbers.

use crate::error::{Result, RowdiffError};
use crate::record::{Column, Record};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Renders rows of one source to text.
pub trait RowRenderer: Send + Sync {
    fn render(&self, columns: &[Column], rows: &[&Record]) -> Result<String>;
}

/// Supported row formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Text,
    Json,
}

impl RenderFormat {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Use 'text' or 'json'", s)),
        }
    }

    pub fn renderer(self) -> Box<dyn RowRenderer> {
        match self {
            Self::Text => Box::new(TextRenderer),
            Self::Json => Box::new(JsonRenderer),
        }
    }
}

fn check_width(columns: &[Column], row: &Record) -> Result<()> {
    if row.len() != columns.len() {
        return Err(RowdiffError::render(format!(
            "row has {} values but source has {} columns",
            row.len(),
            columns.len()
        )));
    }
    Ok(())
}

/// Tab-separated values, `NULL` for nulls, control characters escaped.
///
/// A string that reads `NULL` is written as `\NULL`, so that it never renders
/// like SQL NULL.
pub struct TextRenderer;

impl TextRenderer {
    fn escape(value: &str, out: &mut String) {
        if value == "NULL" {
            out.push_str("\\NULL");
            return;
        }
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c => out.push(c),
            }
        }
    }
}

impl RowRenderer for TextRenderer {
    fn render(&self, columns: &[Column], rows: &[&Record]) -> Result<String> {
        let mut out = String::new();
        for row in rows {
            check_width(columns, row)?;
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    out.push('\t');
                }
                match value {
                    Some(v) => Self::escape(v, &mut out),
                    None => out.push_str("NULL"),
                }
            }
            out.push('\n');
        }
        Ok(out)
    }
}

/// One JSON object per line, keys in column order.
pub struct JsonRenderer;

impl RowRenderer for JsonRenderer {
    fn render(&self, columns: &[Column], rows: &[&Record]) -> Result<String> {
        let mut out = String::new();
        for row in rows {
            check_width(columns, row)?;
            let object: IndexMap<&str, Option<&str>> = columns
                .iter()
                .zip(row.iter())
                .map(|(column, value)| (column.name.as_str(), value.as_deref()))
                .collect();
            out.push_str(&serde_json::to_string(&object)?);
            out.push('\n');
        }
        Ok(out)
    }
}
