//! Command-line interface for rowdiff

use crate::render::RenderFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rowdiff")]
#[command(about = "A streaming row-level diff tool for structured data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the nearest rowdiff.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare the rows of two sources
    Diff {
        /// Left source: <path> or <database>#<table>
        left: String,

        /// Right source: <path> or <database>#<table>
        right: String,

        /// Context rows around each difference
        #[arg(short = 'U', long)]
        context: Option<usize>,

        /// Maximum rows in a single hunk (must be > 0)
        #[arg(long, value_parser = validate_max_hunk_rows)]
        max_hunk_rows: Option<usize>,

        /// Concurrent table diffs: 0 runs sequentially, negative is unbounded
        #[arg(long, allow_negative_numbers = true)]
        concurrency: Option<i64>,

        /// Row format: "text", "json"
        #[arg(long, value_parser = RenderFormat::parse)]
        format: Option<RenderFormat>,

        /// Colorize output
        #[arg(long)]
        color: bool,

        /// Stop after this many seconds and print what is ready
        #[arg(long)]
        timeout: Option<u64>,

        /// Also compare tables, columns and row counts
        #[arg(long)]
        overview: bool,

        /// Show a progress bar on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Show columns and row counts of a source
    Inspect {
        /// Source: <path>, <database> or <database>#<table>
        source: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Validate that the hunk row cap is greater than 0
fn validate_max_hunk_rows(s: &str) -> Result<usize, String> {
    let rows: usize = s
        .parse()
        .map_err(|_| format!("Invalid max hunk rows: '{}'. Must be a positive integer.", s))?;

    if rows == 0 {
        return Err("Max hunk rows must be greater than 0".to_string());
    }

    Ok(rows)
}
