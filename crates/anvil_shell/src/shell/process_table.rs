//! Process table
//!
//! Tracks every launched child process: identity, owning command, and
//! last-known lifecycle state. Records live in an arena of slots plus an
//! insertion-ordered index list (most recent at the head), so reaping never
//! relinks pointers.
//!
//! State is refreshed by explicit non-blocking polls (`waitpid` with
//! `WNOHANG | WUNTRACED | WCONTINUED`); between polls it is a
//! stale-tolerant snapshot that the OS may have moved on from.

use std::cell::RefCell;
use std::rc::Rc;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::debug;

use super::types::ProcStatus;
use crate::parser::CommandLine;

/// Stable handle to an inserted record, valid until the record is reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHandle(usize);

/// One tracked child process.
#[derive(Debug)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub command: CommandLine,
    pub status: ProcStatus,
}

/// One row of a `list()` snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcEntry {
    /// Dense position at snapshot time; not stable across calls.
    pub index: usize,
    pub pid: Pid,
    pub program: String,
    pub status: ProcStatus,
}

/// The set of live process records.
///
/// Cheaply cloneable; clones share the same underlying table. All mutation
/// happens on the single control thread.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    inner: Rc<RefCell<TableInner>>,
}

#[derive(Debug, Default)]
struct TableInner {
    slots: Vec<Option<ProcessRecord>>,
    /// Slot indices in display order, most recently inserted first.
    order: Vec<usize>,
    free: Vec<usize>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record in the `Running` state at the head of the table.
    pub fn insert(&self, command: CommandLine, pid: Pid) -> RecordHandle {
        let mut inner = self.inner.borrow_mut();
        let record = ProcessRecord {
            pid,
            command,
            status: ProcStatus::Running,
        };
        let slot = match inner.free.pop() {
            Some(slot) => {
                inner.slots[slot] = Some(record);
                slot
            }
            None => {
                inner.slots.push(Some(record));
                inner.slots.len() - 1
            }
        };
        inner.order.insert(0, slot);
        debug!(pid = pid.as_raw(), "tracking process");
        RecordHandle(slot)
    }

    /// Poll the OS for lifecycle changes on every non-terminated record.
    ///
    /// A poll that reports no change leaves the record untouched. A poll
    /// that errors marks the record `Terminated`: the OS no longer
    /// recognizes the process (typically already reaped by a blocking
    /// wait), and retrying forever would never converge.
    pub fn refresh_all(&self) {
        let mut inner = self.inner.borrow_mut();
        let TableInner { slots, order, .. } = &mut *inner;

        for &slot in order.iter() {
            let Some(record) = slots[slot].as_mut() else {
                continue;
            };
            if record.status.is_terminated() {
                continue;
            }

            let flags =
                WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
            let next = match waitpid(record.pid, Some(flags)) {
                Ok(WaitStatus::StillAlive) => None,
                Ok(WaitStatus::Exited(_, code)) => {
                    debug!(pid = record.pid.as_raw(), code, "process exited");
                    Some(ProcStatus::Terminated)
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    debug!(pid = record.pid.as_raw(), %signal, "process killed by signal");
                    Some(ProcStatus::Terminated)
                }
                Ok(WaitStatus::Stopped(_, signal)) => {
                    debug!(pid = record.pid.as_raw(), %signal, "process stopped");
                    Some(ProcStatus::Suspended)
                }
                Ok(WaitStatus::Continued(_)) => {
                    debug!(pid = record.pid.as_raw(), "process continued");
                    Some(ProcStatus::Running)
                }
                Ok(_) => None,
                Err(err) => {
                    debug!(pid = record.pid.as_raw(), %err, "wait failed, assuming terminated");
                    Some(ProcStatus::Terminated)
                }
            };
            if let Some(status) = next {
                record.status = status;
            }
        }
    }

    /// Overwrite the state of the first live record matching `pid`.
    ///
    /// Silent no-op when no record matches. This is the optimistic update
    /// applied right after a signal call succeeds; a later `refresh_all`
    /// is the authoritative source and may overwrite it.
    pub fn set_state(&self, pid: Pid, status: ProcStatus) {
        let mut inner = self.inner.borrow_mut();
        let TableInner { slots, order, .. } = &mut *inner;

        for &slot in order.iter() {
            if let Some(record) = slots[slot].as_mut() {
                if record.pid == pid {
                    record.status = status;
                    return;
                }
            }
        }
    }

    /// Remove every record observed `Terminated`, releasing its slot (and
    /// with it the owned command).
    pub fn reap_terminated(&self) {
        let mut inner = self.inner.borrow_mut();
        let TableInner { slots, order, free } = &mut *inner;

        order.retain(|&slot| {
            let terminated =
                matches!(&slots[slot], Some(record) if record.status.is_terminated());
            if terminated {
                if let Some(record) = slots[slot].take() {
                    // A record marked Terminated by the optimistic path may
                    // still have an uncollected zombie behind it.
                    let _ = waitpid(record.pid, Some(WaitPidFlag::WNOHANG));
                    debug!(pid = record.pid.as_raw(), "reaped record");
                }
                free.push(slot);
            }
            !terminated
        });
    }

    /// Produce a display snapshot: refresh every record, capture
    /// `(index, pid, program, status)` rows head-first, then reap
    /// terminated records as a side effect.
    pub fn list(&self) -> Vec<ProcEntry> {
        self.refresh_all();

        let snapshot = {
            let inner = self.inner.borrow();
            inner
                .order
                .iter()
                .filter_map(|&slot| inner.slots[slot].as_ref())
                .enumerate()
                .map(|(index, record)| ProcEntry {
                    index,
                    pid: record.pid,
                    program: record.command.program().to_string(),
                    status: record.status,
                })
                .collect()
        };

        self.reap_terminated();
        snapshot
    }

    /// Last-known state of the first live record matching `pid`.
    pub fn status_of(&self, pid: Pid) -> Option<ProcStatus> {
        let inner = self.inner.borrow();
        inner
            .order
            .iter()
            .filter_map(|&slot| inner.slots[slot].as_ref())
            .find(|record| record.pid == pid)
            .map(|record| record.status)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().order.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::process::{Command, Stdio};
    use std::thread;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    fn command_line(program: &str) -> CommandLine {
        CommandLine {
            args: vec![program.to_string()],
            input_redirect: None,
            output_redirect: None,
            blocking: true,
            next: None,
        }
    }

    fn spawn_child(program: &str, args: &[&str]) -> Pid {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn test child");
        Pid::from_raw(child.id() as i32)
    }

    fn refresh_until(table: &ProcessTable, pid: Pid, status: ProcStatus) -> bool {
        for _ in 0..100 {
            table.refresh_all();
            if table.status_of(pid) == Some(status) {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_insert_orders_head_first() {
        let table = ProcessTable::new();
        table.insert(command_line("first"), Pid::from_raw(1111));
        table.insert(command_line("second"), Pid::from_raw(2222));

        let inner = table.inner.borrow();
        let head = inner.slots[inner.order[0]].as_ref().unwrap();
        assert_eq!(head.command.program(), "second");
        assert_eq!(head.status, ProcStatus::Running);
    }

    #[test]
    fn test_set_state_unknown_pid_is_noop() {
        let table = ProcessTable::new();
        let pid = spawn_child("sleep", &["5"]);
        table.insert(command_line("sleep"), pid);

        table.set_state(Pid::from_raw(pid.as_raw() + 100_000), ProcStatus::Suspended);
        assert_eq!(table.status_of(pid), Some(ProcStatus::Running));
        assert_eq!(table.len(), 1);

        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
        assert!(refresh_until(&table, pid, ProcStatus::Terminated));
    }

    #[test]
    fn test_exited_child_observed_terminated_and_reaped() {
        let table = ProcessTable::new();
        let pid = spawn_child("true", &[]);
        table.insert(command_line("true"), pid);
        assert_eq!(table.len(), 1);

        assert!(refresh_until(&table, pid, ProcStatus::Terminated));

        table.reap_terminated();
        assert!(table.is_empty());
        assert_eq!(table.status_of(pid), None);

        // Reaping an empty table leaves it empty.
        table.reap_terminated();
        assert!(table.is_empty());
    }

    #[test]
    fn test_refresh_error_means_terminated() {
        let table = ProcessTable::new();
        // A pid we certainly never spawned as a child of this process.
        table.insert(command_line("ghost"), Pid::from_raw(999_999));
        table.refresh_all();
        assert_eq!(
            table.status_of(Pid::from_raw(999_999)),
            Some(ProcStatus::Terminated)
        );
    }

    #[test]
    fn test_stop_and_continue_transitions() {
        use nix::sys::signal::{kill, Signal};

        let table = ProcessTable::new();
        let pid = spawn_child("sleep", &["30"]);
        table.insert(command_line("sleep"), pid);

        kill(pid, Signal::SIGSTOP).unwrap();
        assert!(refresh_until(&table, pid, ProcStatus::Suspended));

        kill(pid, Signal::SIGCONT).unwrap();
        assert!(refresh_until(&table, pid, ProcStatus::Running));

        kill(pid, Signal::SIGKILL).unwrap();
        assert!(refresh_until(&table, pid, ProcStatus::Terminated));
        table.reap_terminated();
        assert!(table.is_empty());
    }

    #[test]
    fn test_list_snapshot_includes_terminated_then_reaps() {
        let table = ProcessTable::new();
        let done = spawn_child("true", &[]);
        let alive = spawn_child("sleep", &["30"]);
        table.insert(command_line("true"), done);
        table.insert(command_line("sleep"), alive);

        assert!(refresh_until(&table, done, ProcStatus::Terminated));

        let entries = table.list();
        // The terminated record is still visible in the snapshot...
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].program, "sleep");
        assert_eq!(entries[1].program, "true");
        assert_eq!(entries[1].status, ProcStatus::Terminated);
        // ...but reaped from the table afterwards.
        assert_eq!(table.len(), 1);

        let _ = nix::sys::signal::kill(alive, nix::sys::signal::Signal::SIGKILL);
        assert!(refresh_until(&table, alive, ProcStatus::Terminated));
    }

    #[test]
    fn test_slot_reuse_after_reap() {
        let table = ProcessTable::new();
        let first = spawn_child("true", &[]);
        let handle1 = table.insert(command_line("true"), first);
        assert!(refresh_until(&table, first, ProcStatus::Terminated));
        table.reap_terminated();

        let second = spawn_child("true", &[]);
        let handle2 = table.insert(command_line("true"), second);
        // The freed slot is reused.
        assert_eq!(handle1, handle2);

        assert!(refresh_until(&table, second, ProcStatus::Terminated));
        table.reap_terminated();
    }
}
