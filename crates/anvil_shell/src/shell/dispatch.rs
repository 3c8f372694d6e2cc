//! Job-control dispatcher
//!
//! Decides, once per input line, whether the first token names a control
//! operation (suspend, resume, terminate, list, cd, history tokens, quit)
//! or an external program to launch, and performs it against the shell
//! state.

use std::path::Path;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

use super::launcher;
use super::types::{ProcStatus, ShellError, ShellState};
use crate::parser::{self, CommandLine};

/// Control operations, decided once from the first argument token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    /// `cd <dir>` - change the process-wide working directory
    ChangeDir,
    /// `procs` - print the process table
    ListProcs,
    /// `alarm <pid>` - deliver SIGCONT
    Resume,
    /// `blast <pid>` - deliver SIGINT
    Terminate,
    /// `sleep <pid>` - deliver SIGTSTP
    Suspend,
    /// `history` - print the history ring
    ShowHistory,
    /// Anything else - delegate to the launcher
    Execute,
}

impl ControlOp {
    pub fn classify(token: &str) -> ControlOp {
        match token {
            "cd" => ControlOp::ChangeDir,
            "procs" => ControlOp::ListProcs,
            "alarm" => ControlOp::Resume,
            "blast" => ControlOp::Terminate,
            "sleep" => ControlOp::Suspend,
            "history" => ControlOp::ShowHistory,
            _ => ControlOp::Execute,
        }
    }
}

/// What the read-eval loop should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Quit,
}

/// Handle one raw input line: history expansion, parse, classify, act.
pub fn dispatch_line(line: &str, state: &ShellState) -> Result<Outcome, ShellError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ShellError::Parse(parser::CommandParseError::Empty));
    }
    if line == "quit" {
        return Ok(Outcome::Quit);
    }

    // History expansion happens before parsing; the expanded entry, not
    // the bang token, is what lands in the ring.
    let line = match expand_history(line, state)? {
        Some(expanded) => {
            println!("executing: {expanded}");
            expanded
        }
        None => line.to_string(),
    };
    state.push_history(line.clone());

    let command = parser::parse(&line)?;
    match ControlOp::classify(command.program()) {
        ControlOp::ChangeDir => change_dir(&command, state),
        ControlOp::ListProcs => {
            print_procs(state);
            Ok(Outcome::Handled)
        }
        ControlOp::Resume => signal_op("alarm", Signal::SIGCONT, ProcStatus::Running, &command, state),
        ControlOp::Terminate => {
            signal_op("blast", Signal::SIGINT, ProcStatus::Terminated, &command, state)
        }
        ControlOp::Suspend => {
            signal_op("sleep", Signal::SIGTSTP, ProcStatus::Suspended, &command, state)
        }
        ControlOp::ShowHistory => {
            print_history(state);
            Ok(Outcome::Handled)
        }
        ControlOp::Execute => execute(&command, &line, state),
    }
}

// ============================================================================
// History Expansion
// ============================================================================

/// Resolve `!!` and `!N` tokens against the history ring.
fn expand_history(line: &str, state: &ShellState) -> Result<Option<String>, ShellError> {
    if line == "!!" {
        return match state.last_history_entry() {
            Some(entry) => Ok(Some(entry)),
            None => Err(ShellError::HistoryEmpty),
        };
    }

    if let Some(digits) = line.strip_prefix('!') {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            let entry = digits
                .parse::<usize>()
                .ok()
                .and_then(|index| state.history_entry(index));
            return match entry {
                Some(entry) => Ok(Some(entry)),
                None => Err(ShellError::HistoryIndex {
                    index: digits.to_string(),
                }),
            };
        }
    }

    Ok(None)
}

// ============================================================================
// Control Operations
// ============================================================================

fn change_dir(command: &CommandLine, state: &ShellState) -> Result<Outcome, ShellError> {
    let path = command.args.get(1).ok_or(ShellError::CdMissingArg)?;
    state.set_cwd(Path::new(path))?;
    Ok(Outcome::Handled)
}

/// Deliver `signal` to the pid named by the command's second argument.
///
/// On success the matching record gets the optimistic state hint; the next
/// `refresh_all` is authoritative and may overwrite it. On delivery
/// failure the table is deliberately left untouched.
fn signal_op(
    name: &'static str,
    signal: Signal,
    on_success: ProcStatus,
    command: &CommandLine,
    state: &ShellState,
) -> Result<Outcome, ShellError> {
    let pid = parse_pid(name, command)?;
    match kill(pid, signal) {
        Ok(()) => {
            println!("{name} succeeded!");
            state.table().set_state(pid, on_success);
        }
        Err(err) => {
            debug!(pid = pid.as_raw(), %err, "signal delivery failed");
            println!("{name} failed!");
        }
    }
    Ok(Outcome::Handled)
}

fn parse_pid(command_name: &'static str, command: &CommandLine) -> Result<Pid, ShellError> {
    command
        .args
        .get(1)
        .and_then(|arg| arg.parse::<i32>().ok())
        // Zero and negative values address process groups, never a job.
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
        .ok_or(ShellError::InvalidPid {
            command: command_name,
        })
}

fn print_procs(state: &ShellState) {
    let entries = state.table().list();
    println!("{:<6} {:<10} {:<14} {:<10}", "Index", "PID", "Command", "Status");
    for entry in entries {
        println!(
            "{:<6} {:<10} {:<14} {:<10}",
            entry.index,
            entry.pid.as_raw(),
            entry.program,
            entry.status
        );
    }
}

fn print_history(state: &ShellState) {
    println!("History:");
    for (i, entry) in state.history_entries().into_iter().enumerate() {
        println!("{}: {}", i + 1, entry);
    }
}

// ============================================================================
// Execution
// ============================================================================

fn execute(command: &CommandLine, raw: &str, state: &ShellState) -> Result<Outcome, ShellError> {
    match command.next.as_deref() {
        Some(second) => {
            launcher::launch_pipeline(command, second, state)?;
        }
        None => {
            launcher::launch_single(command, raw, state)?;
        }
    }
    Ok(Outcome::Handled)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(ControlOp::classify("cd"), ControlOp::ChangeDir);
        assert_eq!(ControlOp::classify("procs"), ControlOp::ListProcs);
        assert_eq!(ControlOp::classify("alarm"), ControlOp::Resume);
        assert_eq!(ControlOp::classify("blast"), ControlOp::Terminate);
        assert_eq!(ControlOp::classify("sleep"), ControlOp::Suspend);
        assert_eq!(ControlOp::classify("history"), ControlOp::ShowHistory);
        assert_eq!(ControlOp::classify("ls"), ControlOp::Execute);
        // Only the bare token is a control operation.
        assert_eq!(ControlOp::classify("/bin/sleep"), ControlOp::Execute);
    }

    #[test]
    fn test_quit_and_empty() {
        let state = ShellState::new_default();
        assert_eq!(dispatch_line("quit", &state).unwrap(), Outcome::Quit);
        assert_eq!(dispatch_line("  quit  ", &state).unwrap(), Outcome::Quit);
        assert!(matches!(
            dispatch_line("", &state),
            Err(ShellError::Parse(_))
        ));
        // Neither quit nor the empty line is recorded.
        assert_eq!(state.history_len(), 0);
    }

    #[test]
    fn test_signal_op_requires_pid_argument() {
        let state = ShellState::new_default();
        assert!(matches!(
            dispatch_line("alarm", &state),
            Err(ShellError::InvalidPid { command: "alarm" })
        ));
        assert!(matches!(
            dispatch_line("blast notanumber", &state),
            Err(ShellError::InvalidPid { command: "blast" })
        ));
        assert!(matches!(
            dispatch_line("sleep -4", &state),
            Err(ShellError::InvalidPid { command: "sleep" })
        ));
    }

    #[test]
    fn test_cd_missing_argument() {
        let state = ShellState::new_default();
        assert!(matches!(
            dispatch_line("cd", &state),
            Err(ShellError::CdMissingArg)
        ));
    }

    #[test]
    fn test_bang_on_empty_history() {
        let state = ShellState::new_default();
        assert!(matches!(
            dispatch_line("!!", &state),
            Err(ShellError::HistoryEmpty)
        ));
        assert!(matches!(
            dispatch_line("!3", &state),
            Err(ShellError::HistoryIndex { .. })
        ));
    }

    #[test]
    fn test_bang_word_is_not_expansion() {
        let state = ShellState::new_default();
        // `!foo` is not a history token; it goes to the launcher and fails
        // as an unknown program.
        let err = dispatch_line("!foo", &state).unwrap_err();
        assert!(matches!(err, ShellError::Launch(_)));
        assert_eq!(state.history_entries(), vec!["!foo"]);
    }

    #[test]
    fn test_history_records_expanded_entry() {
        let state = ShellState::new_default();
        dispatch_line("echo once", &state).unwrap();
        dispatch_line("!!", &state).unwrap();
        assert_eq!(state.history_entries(), vec!["echo once", "echo once"]);

        dispatch_line("!1", &state).unwrap();
        assert_eq!(
            state.history_entries(),
            vec!["echo once", "echo once", "echo once"]
        );
    }
}
