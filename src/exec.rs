//! Bounded parallel population of diff documents with ordered output
//!
//! Every task's populate function runs on a rayon pool of at most
//! `concurrency` workers. Meanwhile the calling thread copies the documents
//! to the sink in the order the tasks were given. Each copy blocks until its
//! document is readable, so a slow task holds back the output at its own
//! position without any reordering buffer.

use crate::cancel::CancelToken;
use crate::doc::Doc;
use crate::error::{Result, RowdiffError};
use rayon::ThreadPoolBuilder;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Producer of one document. Must seal the document exactly once.
pub type PopulateFn = Box<dyn FnOnce(&CancelToken) -> Result<()> + Send>;

/// One independent diff computation: a document and the function filling it.
pub struct DiffTask {
    doc: Arc<dyn Doc>,
    populate: PopulateFn,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl DiffTask {
    pub fn new<D, F>(doc: Arc<D>, populate: F) -> Self
    where
        D: Doc + 'static,
        F: FnOnce(&CancelToken) -> Result<()> + Send + 'static,
    {
        Self {
            doc,
            populate: Box::new(populate),
            on_complete: None,
        }
    }

    /// Run `f` after the populate function returns, whatever its outcome.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn doc(&self) -> &Arc<dyn Doc> {
        &self.doc
    }
}

/// Result of [`execute`].
#[derive(Debug)]
pub struct ExecuteOutcome {
    /// Whether any document produced content.
    pub has_diffs: bool,
    /// The first error encountered, if any.
    pub error: Option<RowdiffError>,
}

impl ExecuteOutcome {
    pub fn into_result(self) -> Result<bool> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.has_diffs),
        }
    }
}

/// Worker count for `concurrency`: `0` is sequential, negative is one
/// worker per task.
pub fn pool_size(concurrency: i64, task_count: usize) -> usize {
    let task_count = task_count.max(1);
    if concurrency == 0 {
        1
    } else if concurrency < 0 {
        task_count
    } else {
        usize::try_from(concurrency)
            .unwrap_or(usize::MAX)
            .min(task_count)
    }
}

fn run_task(task: DiffTask, cancel: &CancelToken, populate_failed: &AtomicBool) {
    let DiffTask {
        populate,
        on_complete,
        ..
    } = task;

    match panic::catch_unwind(AssertUnwindSafe(|| populate(cancel))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            populate_failed.store(true, Ordering::SeqCst);
            if !err.is_stopped() {
                log::debug!("Diff task failed: {}", err);
            }
            cancel.cancel(err);
        }
        Err(payload) => {
            // Wake the copy loop before the panic surfaces at scope exit.
            populate_failed.store(true, Ordering::SeqCst);
            cancel.cancel(RowdiffError::Pool {
                message: "diff task panicked".to_string(),
            });
            panic::resume_unwind(payload);
        }
    }

    if let Some(on_complete) = on_complete {
        on_complete();
    }
}

fn close_doc(index: usize, doc: &dyn Doc) {
    if let Err(err) = doc.close() {
        log::warn!("Failed to close diff document {}: {}", index, err);
    }
}

fn close_all(docs: &[Arc<dyn Doc>]) {
    for (index, doc) in docs.iter().enumerate() {
        close_doc(index, doc.as_ref());
    }
}

/// Populate every task's document under a pool of `concurrency` workers and
/// copy the documents to `sink` in task order.
///
/// The first failure cancels `cancel` with the failure as cause. Each
/// document is closed as soon as it has been copied; any left after a failure
/// are closed once every task has returned.
pub fn execute(
    cancel: &CancelToken,
    sink: &mut dyn Write,
    concurrency: i64,
    tasks: Vec<DiffTask>,
) -> ExecuteOutcome {
    let docs: Vec<Arc<dyn Doc>> = tasks.iter().map(|task| task.doc.clone()).collect();
    if tasks.is_empty() {
        return ExecuteOutcome {
            has_diffs: false,
            error: None,
        };
    }

    let threads = pool_size(concurrency, tasks.len());
    let pool = match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("rowdiff-worker-{}", i))
        .build()
    {
        Ok(pool) => pool,
        Err(err) => {
            close_all(&docs);
            return ExecuteOutcome {
                has_diffs: false,
                error: Some(RowdiffError::Pool {
                    message: err.to_string(),
                }),
            };
        }
    };
    log::debug!("Running {} diff task(s) on {} worker(s)", tasks.len(), threads);

    let populate_failed = AtomicBool::new(false);
    let mut copy_failed = false;
    let mut has_diffs = false;

    pool.in_place_scope_fifo(|scope| {
        for task in tasks {
            let cancel = cancel.clone();
            let populate_failed = &populate_failed;
            scope.spawn_fifo(move |_| run_task(task, &cancel, populate_failed));
        }

        for (index, doc) in docs.iter().enumerate() {
            match doc.write_to(sink, cancel) {
                Ok(written) => {
                    has_diffs |= written > 0;
                    // Drained and sealed: nothing will be read from it again.
                    close_doc(index, doc.as_ref());
                }
                Err(err) => {
                    copy_failed = true;
                    cancel.cancel(err);
                    break;
                }
            }
        }
        if let Err(err) = sink.flush() {
            copy_failed = true;
            cancel.cancel(RowdiffError::Io(err));
        }
    });

    close_all(&docs);

    let error = if copy_failed || populate_failed.load(Ordering::SeqCst) {
        cancel.err()
    } else {
        None
    };
    ExecuteOutcome { has_diffs, error }
}
