//! Job-control engine
//!
//! This module provides the core engine:
//! - `types` - shell state, lifecycle states, error taxonomy
//! - `process_table` - tracked child processes and lifecycle refresh
//! - `launcher` - single-command and two-stage pipeline launching
//! - `dispatch` - control-operation vs. execution dispatch
//! - `history` - bounded command history ring

pub mod dispatch;
pub mod history;
pub mod launcher;
pub mod process_table;
pub mod types;

// Re-export the dispatch entry point
pub use dispatch::{dispatch_line, ControlOp, Outcome};

// Re-export types
pub use history::HistoryRing;
pub use launcher::{launch_pipeline, launch_single, LaunchError};
pub use process_table::{ProcEntry, ProcessRecord, ProcessTable, RecordHandle};
pub use types::{ProcStatus, ShellError, ShellState, DEFAULT_HISTORY_CAPACITY};
