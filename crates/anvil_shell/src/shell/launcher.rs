//! Process launcher
//!
//! Spawns the child process(es) for a single command or a two-stage
//! pipeline, wires up redirection and the pipe channel, and registers the
//! result with the process table.
//!
//! Spawning goes through `std::process::Command`, so the fork/exec pair is
//! atomic from the engine's point of view: an exec failure surfaces as a
//! spawn error in the parent and a forked branch can never fall through
//! into parent control flow.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::debug;

use super::types::ShellState;
use crate::parser::CommandLine;

/// Errors from launching child processes.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{program}: command not found")]
    NotFound { program: String },

    #[error("{path}: {source}")]
    Redirect { path: PathBuf, source: io::Error },

    #[error("{program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to create pipe channel: {0}")]
    Pipe(io::Error),
}

impl LaunchError {
    /// Process/channel creation failures other than a bad program are
    /// resource exhaustion: the table's invariants can no longer be
    /// trusted, so the program terminates.
    pub fn is_fatal(&self) -> bool {
        match self {
            LaunchError::Pipe(_) => true,
            LaunchError::Spawn { source, .. } => !matches!(
                source.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }
}

// ============================================================================
// Single Command
// ============================================================================

/// Launch one child process for `command`.
///
/// Applies input/output redirection, emits the pre-exec diagnostic line,
/// inserts a `Running` record, and waits synchronously only when the
/// command's blocking flag is set. Non-blocking children are reaped later
/// through `refresh_all`/`reap_terminated`.
pub fn launch_single(
    command: &CommandLine,
    raw: &str,
    state: &ShellState,
) -> Result<Pid, LaunchError> {
    let program = resolve_program(command.program())?;

    let mut cmd = Command::new(&program);
    cmd.args(&command.args[1..]);
    if let Some(path) = &command.input_redirect {
        cmd.stdin(open_input(path)?);
    }
    if let Some(path) = &command.output_redirect {
        cmd.stdout(create_output(path)?);
    }

    let child = spawn(cmd, command.program())?;
    let pid = Pid::from_raw(child.id() as i32);
    // The record, not the Child handle, owns the process from here on;
    // dropping the handle neither kills nor reaps it.
    drop(child);

    eprintln!("pid {}: executing {}", pid.as_raw(), raw.trim_end());

    let mut record = command.clone();
    record.next = None;
    state.table().insert(record, pid);

    if command.blocking {
        // Reaps the child directly; the record is observed Terminated on
        // the next refresh.
        let _ = waitpid(pid, None);
    }

    Ok(pid)
}

// ============================================================================
// Two-Stage Pipeline
// ============================================================================

/// Launch `first | second` connected by a fresh pipe channel.
///
/// The parent drops its copies of both endpoints as soon as both children
/// are spawned, inserts a record for the first command, and waits for both
/// children unconditionally: pipelines are always blocking.
pub fn launch_pipeline(
    first: &CommandLine,
    second: &CommandLine,
    state: &ShellState,
) -> Result<(Pid, Pid), LaunchError> {
    let program1 = resolve_program(first.program())?;
    let program2 = resolve_program(second.program())?;

    let (reader, writer) = io::pipe().map_err(LaunchError::Pipe)?;

    let mut cmd1 = Command::new(&program1);
    cmd1.args(&first.args[1..]);
    cmd1.stdout(writer);
    if let Some(path) = &first.input_redirect {
        cmd1.stdin(open_input(path)?);
    }

    let mut cmd2 = Command::new(&program2);
    cmd2.args(&second.args[1..]);
    cmd2.stdin(reader);
    if let Some(path) = &second.output_redirect {
        cmd2.stdout(create_output(path)?);
    }

    // `spawn` consumes the Command, releasing the parent's copy of the
    // write end; the reader never observes end-of-input while that copy
    // stays open.
    let child1 = spawn(cmd1, first.program())?;
    let pid1 = Pid::from_raw(child1.id() as i32);
    drop(child1);

    let second_spawn = cmd2.spawn();
    // Same for the parent's copy of the read end.
    drop(cmd2);

    let child2 = match second_spawn {
        Ok(child) => child,
        Err(source) => {
            // Stage one loses its reader and exits on EOF/SIGPIPE.
            let _ = waitpid(pid1, None);
            return Err(LaunchError::Spawn {
                program: second.program().to_string(),
                source,
            });
        }
    };
    let pid2 = Pid::from_raw(child2.id() as i32);
    drop(child2);

    debug!(
        pid1 = pid1.as_raw(),
        pid2 = pid2.as_raw(),
        "pipeline spawned"
    );

    let mut record = first.clone();
    record.next = None;
    state.table().insert(record, pid1);

    let _ = waitpid(pid1, None);
    let _ = waitpid(pid2, None);

    Ok((pid1, pid2))
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve a program name to an executable path.
fn resolve_program(name: &str) -> Result<PathBuf, LaunchError> {
    // A name containing a separator is used as a path directly.
    if name.contains('/') {
        let path = PathBuf::from(name);
        if path.exists() {
            return Ok(path);
        }
        return Err(LaunchError::NotFound {
            program: name.to_string(),
        });
    }

    which::which(name).map_err(|_| LaunchError::NotFound {
        program: name.to_string(),
    })
}

fn spawn(mut cmd: Command, program: &str) -> Result<std::process::Child, LaunchError> {
    cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: program.to_string(),
        source,
    })
}

fn open_input(path: &Path) -> Result<File, LaunchError> {
    File::open(path).map_err(|source| LaunchError::Redirect {
        path: path.to_path_buf(),
        source,
    })
}

fn create_output(path: &Path) -> Result<File, LaunchError> {
    File::create(path).map_err(|source| LaunchError::Redirect {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Tests
// ============================================================================
