//! Lock-step pairing of two row streams

use crate::cancel::CancelToken;
use crate::error::{Result, RowdiffError};
use crate::record::{Record, RecordPair};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Receive the next row of one side. `Ok(None)` once that side is exhausted.
fn next_row(rows: &Receiver<Record>, cancel: &CancelToken) -> Result<Option<Record>> {
    select! {
        recv(rows) -> msg => match msg {
            Ok(row) => Ok(Some(row)),
            Err(_) => {
                // A failing producer cancels before it hangs up.
                cancel.check()?;
                Ok(None)
            }
        },
        recv(cancel.done()) -> _ => Err(cancel.err().unwrap_or(RowdiffError::Cancelled)),
    }
}

fn pair_rows(
    left: &Receiver<Record>,
    right: &Receiver<Record>,
    pairs: &Sender<RecordPair>,
    cancel: &CancelToken,
) -> Result<usize> {
    let mut index = 0;
    loop {
        let left_row = next_row(left, cancel)?;
        let right_row = next_row(right, cancel)?;
        if left_row.is_none() && right_row.is_none() {
            return Ok(index);
        }

        let pair = RecordPair::new(index, left_row, right_row);
        select! {
            send(pairs, pair) -> sent => {
                if sent.is_err() {
                    // Consumer went away; nothing left to do.
                    return Ok(index);
                }
            }
            recv(cancel.done()) -> _ => {
                return Err(cancel.err().unwrap_or(RowdiffError::Cancelled));
            }
        }
        index += 1;
    }
}

/// Pair two row streams by ordinal position on a dedicated thread.
///
/// The returned channel closes once both sides are exhausted, or early if the
/// token is cancelled.
pub fn spawn_pairer(
    left: Receiver<Record>,
    right: Receiver<Record>,
    cancel: CancelToken,
    capacity: usize,
) -> Result<(Receiver<RecordPair>, JoinHandle<()>)> {
    let (tx, rx) = bounded(capacity);
    let handle = thread::Builder::new()
        .name("rowdiff-pairer".to_string())
        .spawn(move || match pair_rows(&left, &right, &tx, &cancel) {
            Ok(count) => log::debug!("Paired {} rows", count),
            Err(err) => log::debug!("Pairing stopped: {}", err),
        })?;
    Ok((rx, handle))
}
