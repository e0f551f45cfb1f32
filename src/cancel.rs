//! Cancellation token carrying the error that caused it

use crate::error::{Result, RowdiffError};
use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Lock a mutex, ignoring poisoning. A panicking holder cannot leave any of
/// our guarded state half-updated in a way later readers would misinterpret.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared cancellation signal for one diff operation and all its producers.
///
/// The first call to [`CancelToken::cancel`] wins: its error becomes the
/// cause, and every waiter selecting on [`CancelToken::done`] wakes up.
/// Later calls are ignored.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cause: Mutex<Option<Arc<RowdiffError>>>,
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, done) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cause: Mutex::new(None),
                trigger: Mutex::new(Some(trigger)),
                done,
            }),
        }
    }

    /// Cancel with `cause`. Returns false if the token was already cancelled.
    pub fn cancel(&self, cause: RowdiffError) -> bool {
        let mut slot = lock(&self.inner.cause);
        if slot.is_some() {
            return false;
        }
        log::debug!("Cancelling operation: {}", cause);
        *slot = Some(cause.into_shared());
        // Dropping the only sender disconnects `done` for every receiver.
        drop(lock(&self.inner.trigger).take());
        true
    }

    /// Channel that becomes ready (disconnected) once the token is cancelled.
    /// Use it as one arm of a `select!` around any blocking wait.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.inner.cause).is_some()
    }

    pub fn cause(&self) -> Option<Arc<RowdiffError>> {
        lock(&self.inner.cause).clone()
    }

    /// The cause as an error value, if cancelled.
    pub fn err(&self) -> Option<RowdiffError> {
        self.cause().map(RowdiffError::Shared)
    }

    /// `Err(cause)` once cancelled, `Ok(())` otherwise.
    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cancel with [`RowdiffError::DeadlineExceeded`] once `timeout` elapses,
    /// unless the token is cancelled first.
    pub fn cancel_after(&self, timeout: Duration) -> Result<()> {
        let token = self.clone();
        thread::Builder::new()
            .name("rowdiff-deadline".to_string())
            .spawn(move || {
                select! {
                    recv(token.done()) -> _ => {}
                    recv(after(timeout)) -> _ => {
                        token.cancel(RowdiffError::DeadlineExceeded);
                    }
                }
            })?;
        Ok(())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cause", &self.cause())
            .finish()
    }
}
