//! anvil - a job-control shell
//!
//! Drives the `anvil_shell` engine from a read-eval loop: prints the
//! working directory, reads one line per iteration, and hands it to the
//! dispatcher. Recoverable errors produce a single diagnostic line and the
//! loop continues; fatal errors (resource exhaustion) terminate with a
//! non-zero status.
//!
//! # Environment Variables
//!
//! - `ANVIL_LOG` - Log level filter (default: "info")

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::debug;

use anvil_shell::shell::{dispatch_line, Outcome, ShellState};

mod config;

use config::Config;

struct CliArgs {
    config: Option<PathBuf>,
    debug: bool,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
        let mut parsed = CliArgs {
            config: None,
            debug: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config requires a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "-d" | "--debug" => parsed.debug = true,
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }
}

fn main() -> ExitCode {
    let args = match CliArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("anvil: {err}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.debug);

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("anvil: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    debug!(?config, "configuration loaded");

    let state = ShellState::new(config.history_capacity);
    run(&state)
}

/// Initialize tracing with env-filter support.
///
/// Uses the ANVIL_LOG env var for log level configuration; `-d` raises the
/// default to debug. Logs go to stderr so the dispatcher's stdout contract
/// stays clean.
fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("ANVIL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

/// The read-eval loop. Returns the process exit code.
fn run(state: &ShellState) -> ExitCode {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{} $ ", state.cwd().display());
        let _ = io::stdout().flush();

        // End-of-input sentinel.
        let Some(line) = lines.next() else {
            return ExitCode::SUCCESS;
        };
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("anvil: read error: {err}");
                return ExitCode::FAILURE;
            }
        };

        match dispatch_line(&line, state) {
            Ok(Outcome::Handled) => {}
            Ok(Outcome::Quit) => return ExitCode::SUCCESS,
            Err(err) if err.is_fatal() => {
                eprintln!("anvil: fatal: {err}");
                return ExitCode::FAILURE;
            }
            Err(err) => eprintln!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(list: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
        list.iter().map(|s| s.to_string())
    }

    #[test]
    fn test_parse_empty_args() {
        let parsed = CliArgs::parse(args(&[])).unwrap();
        assert!(parsed.config.is_none());
        assert!(!parsed.debug);
    }

    #[test]
    fn test_parse_flags() {
        let parsed = CliArgs::parse(args(&["--config", "/tmp/anvil.toml", "-d"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/anvil.toml")));
        assert!(parsed.debug);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(CliArgs::parse(args(&["--wat"])).is_err());
        assert!(CliArgs::parse(args(&["--config"])).is_err());
    }
}
