//! Persistence of the rotation position
//!
//! The position is a single integer stored apart from the availability
//! records, in a small sectioned key-value file:
//!
//! ```text
//! [schedule]
//! last_idx = 2
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::utils::write_atomic;

const SECTION: &str = "schedule";
const KEY: &str = "last_idx";

/// Where the rotation index survives restarts
pub trait StateStore: Send + Sync {
    /// Last persisted index, or `None` when nothing was stored yet
    fn load(&self) -> Result<Option<usize>>;

    /// Persist `index`, replacing the previous value
    fn save(&self, index: usize) -> Result<()>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Rotation index kept in a `[schedule] last_idx = N` file
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<usize>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        parse_index(&content).map_err(|reason| Error::malformed(&self.path, reason))
    }

    fn save(&self, index: usize) -> Result<()> {
        let content = format!("[{SECTION}]\n{KEY} = {index}\n");
        write_atomic(&self.path, &content).map_err(|e| Error::io(&self.path, e))?;
        debug!(path = %self.path.display(), index, "Saved rotation index");
        Ok(())
    }
}

/// Find `last_idx` inside the `[schedule]` section.
///
/// Accepts `=` or `:` as separator; comments (`#`, `;`) and other sections
/// are ignored.
fn parse_index(content: &str) -> std::result::Result<Option<usize>, String> {
    let mut in_section = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.trim().eq_ignore_ascii_case(SECTION);
            continue;
        }

        if !in_section {
            continue;
        }

        let Some((key, value)) = line.split_once(['=', ':']) else {
            continue;
        };

        if key.trim().eq_ignore_ascii_case(KEY) {
            let value = value.trim();
            return value
                .parse::<usize>()
                .map(Some)
                .map_err(|_| format!("{KEY} must be a non-negative integer, got '{value}'"));
        }
    }

    Ok(None)
}

// ============================================================================
// In-memory store
// ============================================================================

/// Rotation index kept in memory; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    slot: Arc<Mutex<Option<usize>>>,
}

impl MemoryStateStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `index`
    pub fn with_index(index: usize) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(index))),
        }
    }

    /// Currently stored index
    pub fn get(&self) -> Option<usize> {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<usize>> {
        Ok(self.get())
    }

    fn save(&self, index: usize) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(index);
        Ok(())
    }
}
