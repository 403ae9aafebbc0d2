//! The collaborators process control relies on but does not implement: permission
//! checks and signal delivery.
//!
//! Hooks are never invoked with a record lock held, but may be invoked with the tree
//! lock held, so they must not fork, exit or take the tree lock themselves.

use crate::error::ProcctlResult;
use proctree::{Pid, ProcTable, Process};

/// Privileges checked by process control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Change the protection of processes against reclamation.
    VmMadvProtect,
}

/// Visibility and permission predicates.
pub trait AccessPolicy: Sync {
    /// Whether `caller` may observe `target` at all.
    fn can_see(&self, caller: Pid, target: &Process) -> bool;

    /// Whether `caller` may change scheduling-related attributes of `target`.
    fn can_sched(&self, caller: Pid, target: &Process) -> bool;

    /// Whether `caller` may send `signo` to `target`. The error is reported to the
    /// caller when no target at all could be signalled.
    fn can_signal(&self, caller: Pid, target: &Process, signo: u32) -> ProcctlResult;

    fn has_privilege(&self, caller: Pid, privilege: Privilege) -> bool;

    /// Whether `caller` runs in a capability-restricted sandbox.
    fn in_capability_mode(&self, caller: Pid) -> bool;
}

/// Description of a signal handed to the delivery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalInfo {
    pub signo: u32,
    /// `si_code`, `SI_USER` for signals sent by process control.
    pub code: u32,
    /// Sender pid.
    pub pid: Pid,
    /// Sender real uid.
    pub uid: u32,
}

/// Signal delivery.
pub trait SignalSink: Sync {
    fn send_signal(&self, target: &Process, info: SignalInfo);
}

/// The calling thread of a process control request, with the collaborators it is
/// checked and served by.
pub struct Caller<'a> {
    pub pid: Pid,
    pub uid: u32,
    pub table: &'a ProcTable,
    pub policy: &'a dyn AccessPolicy,
    pub signals: &'a dyn SignalSink,
}

impl<'a> Caller<'a> {
    pub fn new(
        pid: Pid,
        uid: u32,
        table: &'a ProcTable,
        policy: &'a dyn AccessPolicy,
        signals: &'a dyn SignalSink,
    ) -> Self {
        Self {
            pid,
            uid,
            table,
            policy,
            signals,
        }
    }

    /// Whether `process` is the calling process itself.
    pub fn is(&self, process: &Process) -> bool {
        self.pid == process.get_pid()
    }
}
