//! Two-stage pipeline demo: runs `seq 1 5 | tail -n 2` and waits for both
//! children, printing their pids.
//!
//! ```sh
//! cargo run --example pipeline
//! ```

use anvil_shell::parser;
use anvil_shell::shell::{launcher, ShellState};

fn main() {
    let state = ShellState::new_default();

    let line = "seq 1 5 | tail -n 2";
    let command = parser::parse(line).expect("parse pipeline");
    let second = command.next.as_deref().expect("two stages");

    match launcher::launch_pipeline(&command, second, &state) {
        Ok((pid1, pid2)) => {
            eprintln!(
                "pipeline finished: {} (pid {}) | {} (pid {})",
                command.program(),
                pid1.as_raw(),
                second.program(),
                pid2.as_raw()
            );
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
