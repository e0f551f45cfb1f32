//! Hunk assembly: turn an ordered stream of row pairs into unified-diff hunks
//!
//! Rows flow through a [`SlidingWindow`] of `context + 1` entries so that the
//! leading context of a difference is still available once the difference is
//! seen, without buffering the stream. A hunk then grows until one of:
//!
//! - `2 * context` consecutive matching rows were read (then trimmed back to
//!   `context`, so the next hunk does not repeat shared boundary rows),
//! - it holds `max_hunk_rows` rows,
//! - the stream ends.
//!
//! With `context == 0` a hunk ends at the first matching row.

use crate::cancel::CancelToken;
use crate::color::Palette;
use crate::doc::HunkDoc;
use crate::error::{Result, RowdiffError};
use crate::record::{Column, Record, RecordPair};
use crate::render::RowRenderer;
use crate::unified::{rebase_sections, unified_diff};
use crate::window::SlidingWindow;
use crossbeam_channel::{select, Receiver};

/// Default number of context rows around a difference
pub const DEFAULT_CONTEXT: usize = 3;

/// Default cap on rows buffered into one hunk
pub const DEFAULT_MAX_HUNK_ROWS: usize = 5000;

pub struct HunkAssembler<'a> {
    renderer: &'a dyn RowRenderer,
    left_columns: &'a [Column],
    right_columns: &'a [Column],
    context: usize,
    max_hunk_rows: usize,
    palette: Palette,
}

impl<'a> HunkAssembler<'a> {
    pub fn new(
        renderer: &'a dyn RowRenderer,
        left_columns: &'a [Column],
        right_columns: &'a [Column],
    ) -> Self {
        Self {
            renderer,
            left_columns,
            right_columns,
            context: DEFAULT_CONTEXT,
            max_hunk_rows: DEFAULT_MAX_HUNK_ROWS,
            palette: Palette::plain(),
        }
    }

    pub fn context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn max_hunk_rows(mut self, max_hunk_rows: usize) -> Self {
        self.max_hunk_rows = max_hunk_rows.max(1);
        self
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Consume `pairs` into hunks of `doc`, then seal `doc` with the outcome.
    pub fn assemble(
        &self,
        pairs: &Receiver<RecordPair>,
        doc: &HunkDoc,
        cancel: &CancelToken,
    ) -> Result<()> {
        match self.run(pairs, doc, cancel) {
            Ok(()) => {
                log::debug!("Assembled {} hunk(s)", doc.hunk_count());
                doc.seal(None);
                Ok(())
            }
            Err(err) => {
                let shared = err.into_shared();
                doc.seal(Some(RowdiffError::Shared(shared.clone())));
                Err(RowdiffError::Shared(shared))
            }
        }
    }

    /// Consume `pairs` into hunks of `doc`. Every hunk opened is sealed, but
    /// `doc` itself is left unsealed.
    pub fn run(
        &self,
        pairs: &Receiver<RecordPair>,
        doc: &HunkDoc,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut window = SlidingWindow::new(self.context + 1);
        // First row index not yet shown by an earlier hunk.
        let mut shown_until = 0usize;

        while let Some(pair) = self.next(pairs, cancel)? {
            let equal = pair.equal();
            window.write(pair);
            if equal {
                continue;
            }

            let index = window.count() - 1;
            // Leading context never pushes a hunk past `max_hunk_rows`.
            let start = index
                .saturating_sub(self.context)
                .max(shown_until)
                .max((index + 1).saturating_sub(self.max_hunk_rows));
            let mut rows = window.slice(start, index + 1);
            let offset = index + 1 - rows.len();
            let hunk = doc.new_hunk(offset);

            let rendered = self
                .extend(&mut rows, &mut window, pairs, cancel)
                .and_then(|()| self.render(&rows, offset));
            shown_until = offset + rows.len();

            match rendered {
                Ok((header, body)) => {
                    hunk.write(body.as_bytes());
                    hunk.seal(header.into_bytes(), None);
                }
                Err(err) => {
                    let shared = err.into_shared();
                    hunk.seal(Vec::new(), Some(RowdiffError::Shared(shared.clone())));
                    return Err(RowdiffError::Shared(shared));
                }
            }
        }
        Ok(())
    }

    /// Next pair, `None` at end of stream.
    fn next(
        &self,
        pairs: &Receiver<RecordPair>,
        cancel: &CancelToken,
    ) -> Result<Option<RecordPair>> {
        select! {
            recv(pairs) -> msg => match msg {
                Ok(pair) => Ok(Some(pair)),
                Err(_) => {
                    // The pairer also stops early on cancellation.
                    cancel.check()?;
                    Ok(None)
                }
            },
            recv(cancel.done()) -> _ => Err(cancel.err().unwrap_or(RowdiffError::Cancelled)),
        }
    }

    /// Grow a hunk whose rows end at a difference.
    fn extend(
        &self,
        rows: &mut Vec<RecordPair>,
        window: &mut SlidingWindow<RecordPair>,
        pairs: &Receiver<RecordPair>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let look_ahead = if self.context == 0 { 1 } else { 2 * self.context };
        let mut matching = 0usize;

        while matching < look_ahead && rows.len() < self.max_hunk_rows {
            let pair = match self.next(pairs, cancel)? {
                Some(pair) => pair,
                None => break,
            };
            if pair.equal() {
                matching += 1;
            } else {
                matching = 0;
            }
            window.write(pair.clone());
            rows.push(pair);
        }

        if matching > self.context {
            rows.truncate(rows.len() - (matching - self.context));
        }
        Ok(())
    }

    /// Render both sides of a hunk and diff them, returning header and body.
    fn render(&self, rows: &[RecordPair], offset: usize) -> Result<(String, String)> {
        let left: Vec<&Record> = rows.iter().filter_map(|p| p.left.as_ref()).collect();
        let right: Vec<&Record> = rows.iter().filter_map(|p| p.right.as_ref()).collect();

        let before = self.renderer.render(self.left_columns, &left)?;
        let after = self.renderer.render(self.right_columns, &right)?;
        let diff = unified_diff(&before, &after, self.context);
        let (header, body) = rebase_sections(&diff, offset)?;

        Ok((self.palette.section(&header), self.palette.body(&body)))
    }
}
