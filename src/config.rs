//! Diff configuration: `rowdiff.json` file, overridden by CLI flags

use crate::assemble::{DEFAULT_CONTEXT, DEFAULT_MAX_HUNK_ROWS};
use crate::error::{Result, RowdiffError};
use crate::render::RenderFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up by [`DiffConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "rowdiff.json";

/// Default bound of every row and pair channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

fn default_concurrency() -> i64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Context rows around each difference
    pub context: usize,
    /// Cap on the rows of a single hunk
    pub max_hunk_rows: usize,
    /// Concurrent table diffs: `0` sequential, negative unbounded
    pub concurrency: i64,
    pub channel_capacity: usize,
    pub format: RenderFormat,
    pub color: bool,
    /// Deadline for the whole diff
    pub timeout_secs: Option<u64>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT,
            max_hunk_rows: DEFAULT_MAX_HUNK_ROWS,
            concurrency: default_concurrency(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            format: RenderFormat::default(),
            color: false,
            timeout_secs: None,
        }
    }
}

/// CLI values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub context: Option<usize>,
    pub max_hunk_rows: Option<usize>,
    pub concurrency: Option<i64>,
    pub format: Option<RenderFormat>,
    pub color: bool,
    pub timeout_secs: Option<u64>,
}

impl DiffConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RowdiffError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            RowdiffError::config(format!("Invalid configuration in {}: {}", path.display(), e))
        })
    }

    /// Find `rowdiff.json` by walking up from `start_dir`. The walk stops at
    /// a directory holding `.git`, taken as the project root.
    pub fn discover(start_dir: &Path) -> Option<PathBuf> {
        let mut current = start_dir;
        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if current.join(".git").exists() {
                return None;
            }
            current = current.parent()?;
        }
    }

    /// Configuration for this run: the explicit file, or a discovered one, or
    /// defaults; then `overrides`; then validated.
    pub fn resolve(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let current_dir = std::env::current_dir()?;
                match Self::discover(&current_dir) {
                    Some(path) => {
                        log::debug!("Using configuration from {}", path.display());
                        Self::load(&path)?
                    }
                    None => Self::default(),
                }
            }
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(context) = overrides.context {
            self.context = context;
        }
        if let Some(max_hunk_rows) = overrides.max_hunk_rows {
            self.max_hunk_rows = max_hunk_rows;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if overrides.color {
            self.color = true;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = Some(timeout_secs);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_hunk_rows == 0 {
            return Err(RowdiffError::config("max_hunk_rows must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(RowdiffError::config("channel_capacity must be greater than 0"));
        }
        if self.timeout_secs == Some(0) {
            return Err(RowdiffError::config("timeout_secs must be greater than 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
