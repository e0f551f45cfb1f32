//! Command implementations for rowdiff CLI

use crate::cancel::CancelToken;
use crate::cli::{Commands, OutputFormat};
use crate::config::{ConfigOverrides, DiffConfig};
use crate::diff::{plan_diff, DiffContext};
use crate::error::{Result, RowdiffError};
use crate::exec::{execute, DiffTask};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::DiffProgress;
use crate::source::{fetch_meta, list_tables, SourceRef};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Execute a command, writing its output to `out`.
///
/// Returns whether differences were found.
pub fn execute_command(
    command: Commands,
    config_path: Option<&Path>,
    out: &mut dyn Write,
) -> Result<bool> {
    match command {
        Commands::Diff {
            left,
            right,
            context,
            max_hunk_rows,
            concurrency,
            format,
            color,
            timeout,
            overview,
            progress,
        } => {
            let overrides = ConfigOverrides {
                context,
                max_hunk_rows,
                concurrency,
                format,
                color,
                timeout_secs: timeout,
            };
            let config = DiffConfig::resolve(config_path, &overrides)?;
            diff_command(&config, &left, &right, overview, progress, out)
        }
        Commands::Inspect { source, format } => {
            inspect_command(&source, &format, out)?;
            Ok(false)
        }
    }
}

/// Compare two sources
fn diff_command(
    config: &DiffConfig,
    left: &str,
    right: &str,
    overview: bool,
    show_progress: bool,
    out: &mut dyn Write,
) -> Result<bool> {
    let left = SourceRef::parse(left)?;
    let right = SourceRef::parse(right)?;
    let ctx = Arc::new(DiffContext::new(config));

    let tasks = plan_diff(&ctx, &left, &right, overview)?;
    log::debug!("Planned {} diff task(s) for {} vs {}", tasks.len(), left, right);

    let progress = DiffProgress::new(tasks.len() as u64, show_progress);
    let tasks: Vec<DiffTask> = tasks.into_iter().map(|task| progress.track(task)).collect();

    let cancel = CancelToken::new();
    if let Some(timeout) = config.timeout() {
        cancel.cancel_after(timeout)?;
    }

    let outcome = execute(&cancel, out, config.concurrency, tasks);
    progress.finish();
    // Stops the deadline watcher; a no-op if the diff already failed.
    cancel.cancel(RowdiffError::Cancelled);

    outcome.into_result()
}

/// Show columns and row counts of a source
fn inspect_command(source: &str, format: &str, out: &mut dyn Write) -> Result<()> {
    let output_format = OutputFormat::parse(format).map_err(RowdiffError::invalid_input)?;
    let source = SourceRef::parse(source)?;

    let relations = if source.is_whole_database() {
        list_tables(&source)?
            .iter()
            .map(|table| source.with_table(table))
            .collect()
    } else {
        vec![source]
    };

    let mut sources = Vec::with_capacity(relations.len());
    for relation in &relations {
        match fetch_meta(relation)? {
            Some(meta) => sources.push(meta),
            None => return Err(RowdiffError::not_found(relation.to_string())),
        }
    }

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_sources(out, &sources)?,
        OutputFormat::Json => writeln!(out, "{}", JsonFormatter::format(&sources)?)?,
    }
    out.flush()?;
    Ok(())
}
