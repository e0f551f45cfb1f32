//! Progress reporting for multi-task diffs

use crate::exec::DiffTask;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Counts finished diff tasks on a stderr progress bar.
#[derive(Debug)]
pub struct DiffProgress {
    bar: ProgressBar,
}

impl DiffProgress {
    /// A bar over `total` tasks. Nothing is drawn unless `visible`.
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            create_progress_bar(total, "Comparing")
        } else {
            ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden())
        };
        Self { bar }
    }

    /// Advance the bar when `task` has finished populating.
    pub fn track(&self, task: DiffTask) -> DiffTask {
        let bar = self.bar.clone();
        task.on_complete(move || bar.inc(1))
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for DiffProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(err) => log::debug!("Progress template rejected: {}", err),
    }
    pb.set_message(message.to_string());
    pb
}
