//! Diff operations: plan the tasks comparing two sources and populate them
//!
//! A table diff streams both sides through row producers and the pairer into
//! a [`HunkAssembler`]. Comparing two database files without naming a table
//! makes one such task per table, in lexical table order. The optional
//! overview compares the shape of both sides (tables, columns, row counts).

use crate::assemble::HunkAssembler;
use crate::cancel::CancelToken;
use crate::color::Palette;
use crate::config::DiffConfig;
use crate::doc::{HunkDoc, Title, UnifiedDoc};
use crate::error::{Result, RowdiffError};
use crate::exec::DiffTask;
use crate::meta_cache::MetaCache;
use crate::pair::spawn_pairer;
use crate::record::{Column, Record};
use crate::render::RenderFormat;
use crate::source::{fetch_meta, list_tables, spawn_rows, SourceMeta, SourceRef};
use crate::unified::unified_diff;
use crossbeam_channel::{bounded, Receiver};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Settings and shared state of one diff invocation
pub struct DiffContext {
    pub context: usize,
    pub max_hunk_rows: usize,
    pub channel_capacity: usize,
    pub format: RenderFormat,
    pub palette: Palette,
    cache: MetaCache<Option<SourceMeta>>,
}

impl DiffContext {
    pub fn new(config: &DiffConfig) -> Self {
        Self {
            context: config.context,
            max_hunk_rows: config.max_hunk_rows,
            channel_capacity: config.channel_capacity,
            format: config.format,
            palette: Palette::new(config.color),
            cache: MetaCache::new(),
        }
    }

    /// Metadata of `source`, fetched once per location. `None` if it does
    /// not exist.
    pub fn meta(&self, source: &SourceRef) -> Result<Option<SourceMeta>> {
        self.cache
            .get_or_fetch(&source.to_string(), || fetch_meta(source))
    }

    pub fn cache(&self) -> &MetaCache<Option<SourceMeta>> {
        &self.cache
    }
}

/// Seal with the outcome of `result`, then pass it on.
fn seal_with<T>(result: Result<T>, seal: impl FnOnce(Option<RowdiffError>)) -> Result<T> {
    match result {
        Ok(value) => {
            seal(None);
            Ok(value)
        }
        Err(err) => {
            let shared = err.into_shared();
            seal(Some(RowdiffError::Shared(shared.clone())));
            Err(RowdiffError::Shared(shared))
        }
    }
}

/// Task comparing the rows of two relations.
pub fn table_diff_task(ctx: Arc<DiffContext>, left: SourceRef, right: SourceRef) -> DiffTask {
    let title = ctx.palette.title(&format!("rowdiff diff {} {}", left, right));
    let header = ctx.palette.body(&format!("--- {}\n+++ {}\n", left, right));
    let doc = Arc::new(HunkDoc::new(Some(Title::new(title)), header));
    let populate_doc = doc.clone();

    DiffTask::new(doc, move |cancel: &CancelToken| {
        let result = populate_table(&ctx, &left, &right, &populate_doc, cancel);
        seal_with(result, |err| populate_doc.seal(err))
    })
}

fn closed_stream() -> Receiver<Record> {
    let (_, rx) = bounded(0);
    rx
}

fn open_rows(
    ctx: &DiffContext,
    source: &SourceRef,
    meta: Option<&SourceMeta>,
    cancel: &CancelToken,
    handles: &mut Vec<JoinHandle<()>>,
) -> Result<Receiver<Record>> {
    match meta {
        Some(meta) => {
            let (rows, handle) = spawn_rows(
                source.clone(),
                &meta.columns,
                cancel.clone(),
                ctx.channel_capacity,
            )?;
            handles.push(handle);
            Ok(rows)
        }
        None => Ok(closed_stream()),
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) -> Result<()> {
    let mut panicked = false;
    for handle in handles {
        panicked |= handle.join().is_err();
    }
    if panicked {
        return Err(RowdiffError::Pool {
            message: "row producer panicked".to_string(),
        });
    }
    Ok(())
}

/// Stream both sides into hunks of `doc`. Leaves `doc` unsealed.
fn populate_table(
    ctx: &DiffContext,
    left: &SourceRef,
    right: &SourceRef,
    doc: &HunkDoc,
    cancel: &CancelToken,
) -> Result<()> {
    cancel.check()?;
    let left_meta = ctx.meta(left)?;
    let right_meta = ctx.meta(right)?;
    if left_meta.is_none() && right_meta.is_none() {
        log::debug!("Neither {} nor {} exists, nothing to compare", left, right);
        return Ok(());
    }

    let columns = |meta: &Option<SourceMeta>| -> Vec<Column> {
        meta.as_ref().map(|m| m.columns.clone()).unwrap_or_default()
    };
    let left_columns = columns(&left_meta);
    let right_columns = columns(&right_meta);

    let mut handles = Vec::new();
    let pairs = open_rows(ctx, left, left_meta.as_ref(), cancel, &mut handles)
        .and_then(|left_rows| {
            let right_rows = open_rows(ctx, right, right_meta.as_ref(), cancel, &mut handles)?;
            spawn_pairer(left_rows, right_rows, cancel.clone(), ctx.channel_capacity)
        });
    let pairs = match pairs {
        Ok((pairs, pairer)) => {
            handles.push(pairer);
            pairs
        }
        Err(err) => {
            // Producers already running stop once their receivers are gone.
            join_all(handles)?;
            return Err(err);
        }
    };

    let renderer = ctx.format.renderer();
    let result = HunkAssembler::new(renderer.as_ref(), &left_columns, &right_columns)
        .context(ctx.context)
        .max_hunk_rows(ctx.max_hunk_rows)
        .palette(ctx.palette)
        .run(&pairs, doc, cancel);

    // Disconnect before joining so the pairer and producers cannot stay
    // blocked on a send nobody will receive.
    drop(pairs);
    join_all(handles)?;
    result?;

    log::debug!(
        "Compared {} and {}: {} hunk(s)",
        left,
        right,
        doc.hunk_count()
    );
    Ok(())
}

/// Shape of one relation as compared by the overview.
fn describe_relation(name: Option<&str>, meta: &SourceMeta) -> String {
    let mut text = String::new();
    if let Some(name) = name {
        text.push_str(&format!("[{}]\n", name));
    }
    let columns = meta
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.data_type))
        .collect::<Vec<_>>()
        .join(", ");
    text.push_str(&format!("columns: {}\n", columns));
    text.push_str(&format!("rows: {}\n", meta.row_count));
    text
}

/// Tables of a database source. A missing database has none.
fn tables_of(source: &SourceRef) -> Result<Vec<String>> {
    match list_tables(source) {
        Ok(tables) => Ok(tables),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

/// Overview text of a source: every relation with its columns and row count.
pub fn overview_text(ctx: &DiffContext, source: &SourceRef) -> Result<String> {
    if source.is_whole_database() {
        let mut text = String::new();
        for table in tables_of(source)? {
            if let Some(meta) = ctx.meta(&source.with_table(&table))? {
                text.push_str(&describe_relation(Some(&table), &meta));
            }
        }
        return Ok(text);
    }

    Ok(match ctx.meta(source)? {
        Some(meta) => describe_relation(source.table.as_deref(), &meta),
        None => String::new(),
    })
}

/// Task comparing the overview of both sides.
pub fn overview_diff_task(ctx: Arc<DiffContext>, left: SourceRef, right: SourceRef) -> DiffTask {
    let title = ctx
        .palette
        .title(&format!("rowdiff overview {} {}", left, right));
    let doc = Arc::new(UnifiedDoc::new(Some(Title::new(title))));
    let populate_doc = doc.clone();

    DiffTask::new(doc, move |cancel: &CancelToken| {
        let result = cancel.check().and_then(|()| {
            let before = overview_text(&ctx, &left)?;
            let after = overview_text(&ctx, &right)?;
            let diff = unified_diff(&before, &after, ctx.context);
            if !diff.is_empty() {
                let header = format!("--- {}\n+++ {}\n", left, right);
                populate_doc.write(ctx.palette.body(&header).as_bytes());
                populate_doc.write(ctx.palette.body(&diff).as_bytes());
            }
            Ok(())
        });
        seal_with(result, |err| populate_doc.seal(err))
    })
}

/// The tasks comparing `left` with `right`, in output order.
pub fn plan_diff(
    ctx: &Arc<DiffContext>,
    left: &SourceRef,
    right: &SourceRef,
    overview: bool,
) -> Result<Vec<DiffTask>> {
    let mut tasks = Vec::new();
    if overview {
        tasks.push(overview_diff_task(ctx.clone(), left.clone(), right.clone()));
    }

    match (left.is_whole_database(), right.is_whole_database()) {
        (true, true) => {
            let tables: BTreeSet<String> = tables_of(left)?
                .into_iter()
                .chain(tables_of(right)?)
                .collect();
            log::info!("Comparing {} table(s)", tables.len());
            for table in tables {
                tasks.push(table_diff_task(
                    ctx.clone(),
                    left.with_table(&table),
                    right.with_table(&table),
                ));
            }
        }
        (false, false) => {
            tasks.push(table_diff_task(ctx.clone(), left.clone(), right.clone()));
        }
        _ => {
            return Err(RowdiffError::invalid_input(format!(
                "Cannot compare a whole database with a single relation: {} vs {}",
                left, right
            )));
        }
    }
    Ok(tasks)
}
