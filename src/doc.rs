//! Write-once, blocking-read diff documents
//!
//! A document is populated by one producer and read by one consumer that may
//! start reading before the producer is done. Reads block until the content
//! they need is sealed, racing against the operation's [`CancelToken`].
//!
//! Two shapes exist:
//! - [`UnifiedDoc`]: a single body, readable once the doc is sealed.
//! - [`HunkDoc`]: an ordered list of independently sealed [`Hunk`]s. Each hunk
//!   is streamed as soon as it is sealed, in creation order.
//!
//! Sealing twice, or writing after sealing, is a bug in the producer and
//! panics.

use crate::cancel::{lock, CancelToken};
use crate::error::{Result, RowdiffError};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Readable side of a diff document.
pub trait Doc: Send + Sync {
    /// Block until content is available, then copy it to `w`.
    ///
    /// Returns the number of bytes written. A doc sealed with an error yields
    /// that error; a doc sealed empty yields `Ok(0)` without writing.
    fn write_to(&self, w: &mut dyn Write, cancel: &CancelToken) -> Result<u64>;

    fn is_sealed(&self) -> bool;

    /// Release buffered content. Idempotent.
    fn close(&self) -> Result<()>;

    fn read_all(&self, cancel: &CancelToken) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf, cancel)?;
        Ok(buf)
    }
}

/// First line(s) printed before a document's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title(Vec<u8>);

impl Title {
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        let mut bytes = text.into();
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Wait for the seal channel to disconnect, or for cancellation.
fn await_seal(sealed: &Receiver<()>, cancel: &CancelToken) -> Result<()> {
    select! {
        recv(sealed) -> _ => Ok(()),
        recv(cancel.done()) -> _ => {
            // A seal that raced the cancellation still counts.
            match sealed.try_recv() {
                Err(TryRecvError::Disconnected) => Ok(()),
                _ => Err(cancel.err().unwrap_or(RowdiffError::Cancelled)),
            }
        }
    }
}

fn shared_err(err: &Option<Arc<RowdiffError>>) -> Result<()> {
    match err {
        Some(err) => Err(RowdiffError::Shared(err.clone())),
        None => Ok(()),
    }
}

/// Single-body document.
pub struct UnifiedDoc {
    title: Option<Title>,
    state: Mutex<UnifiedState>,
    sealed: Receiver<()>,
}

struct UnifiedState {
    body: Vec<u8>,
    err: Option<Arc<RowdiffError>>,
    trigger: Option<Sender<()>>,
    closed: bool,
}

impl UnifiedDoc {
    pub fn new(title: Option<Title>) -> Self {
        let (trigger, sealed) = bounded(0);
        Self {
            title,
            state: Mutex::new(UnifiedState {
                body: Vec::new(),
                err: None,
                trigger: Some(trigger),
                closed: false,
            }),
            sealed,
        }
    }

    /// Append to the body.
    ///
    /// # Panics
    ///
    /// Panics if the doc is already sealed or closed.
    pub fn write(&self, buf: &[u8]) {
        let mut state = lock(&self.state);
        assert!(state.trigger.is_some(), "write to sealed doc");
        assert!(!state.closed, "write to closed doc");
        state.body.extend_from_slice(buf);
    }

    /// Make the doc readable. With `err`, every read yields that error.
    ///
    /// # Panics
    ///
    /// Panics if the doc is already sealed.
    pub fn seal(&self, err: Option<RowdiffError>) {
        let mut state = lock(&self.state);
        let trigger = state.trigger.take();
        assert!(trigger.is_some(), "doc sealed twice");
        state.err = err.map(RowdiffError::into_shared);
        drop(trigger);
    }
}

impl Doc for UnifiedDoc {
    fn write_to(&self, w: &mut dyn Write, cancel: &CancelToken) -> Result<u64> {
        await_seal(&self.sealed, cancel)?;
        let state = lock(&self.state);
        shared_err(&state.err)?;
        if state.body.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        if let Some(title) = &self.title {
            w.write_all(title.as_bytes())?;
            written += title.as_bytes().len();
        }
        w.write_all(&state.body)?;
        written += state.body.len();
        Ok(written as u64)
    }

    fn is_sealed(&self) -> bool {
        lock(&self.state).trigger.is_none()
    }

    fn close(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.closed = true;
        state.body = Vec::new();
        Ok(())
    }
}

/// One contiguous region of a [`HunkDoc`].
///
/// The body is written first; the header (usually the `@@ ... @@` line) is
/// only known at seal time, once the hunk's final row count is.
pub struct Hunk {
    offset: usize,
    state: Mutex<HunkState>,
    sealed: Receiver<()>,
}

struct HunkState {
    header: Vec<u8>,
    body: Vec<u8>,
    err: Option<Arc<RowdiffError>>,
    trigger: Option<Sender<()>>,
}

impl Hunk {
    fn new(offset: usize) -> Self {
        let (trigger, sealed) = bounded(0);
        Self {
            offset,
            state: Mutex::new(HunkState {
                header: Vec::new(),
                body: Vec::new(),
                err: None,
                trigger: Some(trigger),
            }),
            sealed,
        }
    }

    /// Nominal line offset of this hunk within a conventional unified diff.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// # Panics
    ///
    /// Panics if the hunk is already sealed.
    pub fn write(&self, buf: &[u8]) {
        let mut state = lock(&self.state);
        assert!(state.trigger.is_some(), "write to sealed hunk");
        state.body.extend_from_slice(buf);
    }

    /// # Panics
    ///
    /// Panics if the hunk is already sealed.
    pub fn seal(&self, header: Vec<u8>, err: Option<RowdiffError>) {
        let mut state = lock(&self.state);
        let trigger = state.trigger.take();
        assert!(trigger.is_some(), "hunk sealed twice");
        state.header = header;
        state.err = err.map(RowdiffError::into_shared);
        drop(trigger);
    }

    pub fn is_sealed(&self) -> bool {
        lock(&self.state).trigger.is_none()
    }

    /// The header, available only once sealed.
    pub fn header(&self) -> Option<Vec<u8>> {
        let state = lock(&self.state);
        state.trigger.is_none().then(|| state.header.clone())
    }

    fn content(&self, cancel: &CancelToken) -> Result<(Vec<u8>, Vec<u8>)> {
        await_seal(&self.sealed, cancel)?;
        let state = lock(&self.state);
        shared_err(&state.err)?;
        Ok((state.header.clone(), state.body.clone()))
    }

    fn release(&self) {
        let mut state = lock(&self.state);
        state.header = Vec::new();
        state.body = Vec::new();
    }
}

/// Multi-hunk document.
///
/// Supports a single reader: hunk arrival notifications are consumed by
/// whoever is reading, and each hunk's content is released once written.
pub struct HunkDoc {
    title: Option<Title>,
    header: Vec<u8>,
    state: Mutex<HunkDocState>,
    added: Receiver<()>,
}

struct HunkDocState {
    hunks: Vec<Arc<Hunk>>,
    err: Option<Arc<RowdiffError>>,
    // Dropped at seal time, which also wakes a reader waiting for hunks.
    notify: Option<Sender<()>>,
    closed: bool,
}

impl HunkDoc {
    /// `header` is printed after the title and before the first hunk.
    pub fn new(title: Option<Title>, header: impl Into<Vec<u8>>) -> Self {
        let (notify, added) = unbounded();
        Self {
            title,
            header: header.into(),
            state: Mutex::new(HunkDocState {
                hunks: Vec::new(),
                err: None,
                notify: Some(notify),
                closed: false,
            }),
            added,
        }
    }

    /// Open a new hunk at the end of the hunk list.
    ///
    /// # Panics
    ///
    /// Panics if the doc is already sealed or closed.
    pub fn new_hunk(&self, offset: usize) -> Arc<Hunk> {
        let mut state = lock(&self.state);
        assert!(!state.closed, "new hunk on closed doc");
        let hunk = Arc::new(Hunk::new(offset));
        state.hunks.push(hunk.clone());
        match &state.notify {
            Some(notify) => {
                let _ = notify.send(());
            }
            None => panic!("new hunk on sealed doc"),
        }
        hunk
    }

    /// # Panics
    ///
    /// Panics if the doc is already sealed.
    pub fn seal(&self, err: Option<RowdiffError>) {
        let mut state = lock(&self.state);
        let notify = state.notify.take();
        assert!(notify.is_some(), "doc sealed twice");
        state.err = err.map(RowdiffError::into_shared);
        drop(notify);
    }

    pub fn hunk_count(&self) -> usize {
        lock(&self.state).hunks.len()
    }

    /// The next hunk to read, `None` at end of stream.
    fn next_hunk(&self, index: usize, cancel: &CancelToken) -> Result<Option<Arc<Hunk>>> {
        loop {
            {
                let state = lock(&self.state);
                if let Some(hunk) = state.hunks.get(index) {
                    return Ok(Some(hunk.clone()));
                }
                if state.notify.is_none() {
                    shared_err(&state.err)?;
                    return Ok(None);
                }
                if state.closed {
                    return Ok(None);
                }
            }
            select! {
                recv(self.added) -> _ => {}
                recv(cancel.done()) -> _ => {
                    let state = lock(&self.state);
                    if state.notify.is_none() || state.hunks.len() > index {
                        continue;
                    }
                    return Err(cancel.err().unwrap_or(RowdiffError::Cancelled));
                }
            }
        }
    }
}

impl Doc for HunkDoc {
    fn write_to(&self, w: &mut dyn Write, cancel: &CancelToken) -> Result<u64> {
        {
            let state = lock(&self.state);
            if state.notify.is_none() {
                shared_err(&state.err)?;
            }
        }

        let mut written = 0usize;
        let mut started = false;
        let mut index = 0;
        while let Some(hunk) = self.next_hunk(index, cancel)? {
            index += 1;
            let (header, body) = hunk.content(cancel)?;
            if header.is_empty() && body.is_empty() {
                continue;
            }
            if !started {
                started = true;
                if let Some(title) = &self.title {
                    w.write_all(title.as_bytes())?;
                    written += title.as_bytes().len();
                }
                w.write_all(&self.header)?;
                written += self.header.len();
            }
            w.write_all(&header)?;
            w.write_all(&body)?;
            written += header.len() + body.len();
            // Written hunks are not kept around for the rest of the doc.
            hunk.release();
        }
        Ok(written as u64)
    }

    fn is_sealed(&self) -> bool {
        lock(&self.state).notify.is_none()
    }

    fn close(&self) -> Result<()> {
        let hunks = {
            let mut state = lock(&self.state);
            state.closed = true;
            std::mem::take(&mut state.hunks)
        };
        for hunk in hunks {
            hunk.release();
        }
        Ok(())
    }
}
