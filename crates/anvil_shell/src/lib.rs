//! Job-control shell engine
//!
//! Parses input lines into executable command pipelines, launches them as
//! child processes, tracks their lifecycle in a process table, and lets the
//! caller signal them into suspended/running/terminated states - a minimal
//! shell job-control subsystem.
//!
//! The engine is deliberately single-threaded: concurrency exists only at
//! the operating-system level between the shell and its children, and the
//! process table is a stale-tolerant snapshot refreshed by explicit
//! non-blocking polls. Unix only.
//!
//! # Example
//!
//! ```no_run
//! use anvil_shell::shell::{dispatch_line, Outcome, ShellState};
//!
//! let state = ShellState::new_default();
//! match dispatch_line("ls -l | tail -n 2", &state) {
//!     Ok(Outcome::Quit) => {}
//!     Ok(Outcome::Handled) => {}
//!     Err(err) => eprintln!("{err}"),
//! }
//! ```

pub mod parser;
pub mod shell;

pub use parser::{parse, CommandLine, CommandParseError};
pub use shell::{dispatch_line, Outcome, ProcStatus, ShellError, ShellState};
