//! # rowdiff
//!
//! A streaming, concurrent row-level diff tool for structured data sources.
//!
//! Two sources are read row by row, paired by position and assembled into
//! unified-diff hunks with bounded memory. Several tables are compared in
//! parallel while their output keeps a fixed order.

pub mod assemble;
pub mod cancel;
pub mod cli;
pub mod color;
pub mod commands;
pub mod config;
pub mod diff;
pub mod doc;
pub mod error;
pub mod exec;
pub mod meta_cache;
pub mod output;
pub mod pair;
pub mod progress;
pub mod record;
pub mod render;
pub mod source;
pub mod sql;
pub mod unified;
pub mod window;

pub use assemble::HunkAssembler;
pub use cancel::CancelToken;
pub use config::DiffConfig;
pub use doc::{Doc, Hunk, HunkDoc, Title, UnifiedDoc};
pub use error::{Result, RowdiffError};
pub use exec::{execute, DiffTask, ExecuteOutcome};
pub use window::SlidingWindow;
