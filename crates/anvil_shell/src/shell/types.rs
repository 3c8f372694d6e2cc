//! Core types for the job-control engine
//!
//! This module provides:
//! - `ShellState` - the explicit context handle (cwd mirror, process table,
//!   history ring) passed into every operation
//! - `ProcStatus` - tracked process lifecycle states
//! - `ShellError` - the engine's recoverable/fatal error taxonomy

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::history::HistoryRing;
use super::launcher::LaunchError;
use super::process_table::ProcessTable;
use crate::parser::CommandParseError;

/// Default capacity of the history ring.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

// ============================================================================
// Lifecycle States
// ============================================================================

/// Last-known lifecycle state of a tracked process.
///
/// A record's state is eventually consistent: it is authoritative only
/// immediately after a refresh or a signal success, and may oscillate
/// between `Running` and `Suspended` before reaching `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatus {
    Running,
    Suspended,
    Terminated,
}

impl ProcStatus {
    pub fn is_terminated(self) -> bool {
        matches!(self, ProcStatus::Terminated)
    }
}

impl fmt::Display for ProcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcStatus::Running => "Running",
            ProcStatus::Suspended => "Suspended",
            ProcStatus::Terminated => "Terminated",
        };
        f.pad(name)
    }
}

// ============================================================================
// Shell State
// ============================================================================

/// Central state container for the engine.
///
/// Constructed once at startup and passed by reference into dispatch,
/// launcher, and table operations. Uses `RefCell` for interior mutability;
/// the engine runs on a single control thread, so no locking is involved.
pub struct ShellState {
    /// Mirror of the process-wide working directory (for display)
    cwd: RefCell<PathBuf>,
    /// Tracked child processes
    table: ProcessTable,
    /// Bounded ring of previously entered command lines
    history: RefCell<HistoryRing>,
}

impl ShellState {
    pub fn new(history_capacity: usize) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            cwd: RefCell::new(cwd),
            table: ProcessTable::new(),
            history: RefCell::new(HistoryRing::new(history_capacity)),
        }
    }

    /// Create a state with default settings.
    pub fn new_default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> PathBuf {
        self.cwd.borrow().clone()
    }

    /// Change the process-wide working directory and update the mirror.
    pub fn set_cwd(&self, path: &Path) -> Result<(), ShellError> {
        std::env::set_current_dir(path).map_err(|source| ShellError::ChangeDir {
            path: path.to_path_buf(),
            source,
        })?;
        // Mirror what the OS actually resolved, not the argument.
        let cwd = std::env::current_dir().unwrap_or_else(|_| path.to_path_buf());
        *self.cwd.borrow_mut() = cwd;
        Ok(())
    }

    /// Get the process table.
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Record a command line in the history ring.
    pub fn push_history(&self, entry: impl Into<String>) {
        self.history.borrow_mut().push(entry);
    }

    /// Get the n-th history entry (1-based, oldest first).
    pub fn history_entry(&self, n: usize) -> Option<String> {
        self.history.borrow().get(n).map(str::to_string)
    }

    /// Get the most recent history entry.
    pub fn last_history_entry(&self) -> Option<String> {
        self.history.borrow().last().map(str::to_string)
    }

    /// Snapshot of all history entries, oldest first.
    pub fn history_entries(&self) -> Vec<String> {
        self.history.borrow().iter().map(str::to_string).collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.borrow().len()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by dispatch. Everything except the fatal launch class is
/// recoverable: the read-eval loop prints one diagnostic line and continues.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}")]
    Parse(#[from] CommandParseError),

    #[error("cd: missing directory argument")]
    CdMissingArg,

    #[error("cd: {path}: {source}")]
    ChangeDir { path: PathBuf, source: io::Error },

    #[error("{command}: expected a pid argument")]
    InvalidPid { command: &'static str },

    #[error("no such history entry: !{index}")]
    HistoryIndex { index: String },

    #[error("history is empty")]
    HistoryEmpty,

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl ShellError {
    /// Whether this error should terminate the whole program.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Launch(err) if err.is_fatal())
    }
}

// ============================================================================
// Tests
// ============================================================================
