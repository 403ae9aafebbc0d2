//! Process control dispatch.
//!
//! A request names a target (one process, or every member of a process group), a
//! command and the command's payload. The dispatcher takes the tree lock in the mode
//! the command needs, resolves the target, applies the command to every resolved
//! process and folds the outcomes into one result.

mod kill;
mod protect;
mod reaper;
mod trace;

pub use self::kill::*;
pub use self::protect::*;
pub use self::reaper::*;
pub use self::trace::*;

use crate::error::{ProcctlError, ProcctlResult};
use crate::policy::Caller;
use alloc::sync::Arc;
use linux_raw_sys::general::{P_PGID, P_PID};
use proctree::{LockMode, Pid, ProcState, Process, ProcessTree, TreeGuard};

pub const PROC_SPROTECT: i32 = 1;
pub const PROC_REAP_ACQUIRE: i32 = 2;
pub const PROC_REAP_RELEASE: i32 = 3;
pub const PROC_REAP_STATUS: i32 = 4;
pub const PROC_REAP_GETPIDS: i32 = 5;
pub const PROC_REAP_KILL: i32 = 6;
pub const PROC_TRACE_CTL: i32 = 7;
pub const PROC_TRACE_STATUS: i32 = 8;

/// Kind of target a request is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    /// A single process.
    Pid,
    /// Every member of a process group.
    Pgid,
}

impl TryFrom<u32> for IdType {
    type Error = ProcctlError;

    fn try_from(idtype: u32) -> ProcctlResult<Self> {
        match idtype {
            P_PID => Ok(Self::Pid),
            P_PGID => Ok(Self::Pgid),
            _ => Err(ProcctlError::InvalidArgument),
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcctlCmd {
    SetProtection = PROC_SPROTECT,
    ReapAcquire = PROC_REAP_ACQUIRE,
    ReapRelease = PROC_REAP_RELEASE,
    ReapStatus = PROC_REAP_STATUS,
    ReapGetPids = PROC_REAP_GETPIDS,
    ReapKill = PROC_REAP_KILL,
    TraceCtl = PROC_TRACE_CTL,
    TraceStatus = PROC_TRACE_STATUS,
}

impl ProcctlCmd {
    pub fn from_raw(com: i32) -> Option<Self> {
        Some(match com {
            PROC_SPROTECT => Self::SetProtection,
            PROC_REAP_ACQUIRE => Self::ReapAcquire,
            PROC_REAP_RELEASE => Self::ReapRelease,
            PROC_REAP_STATUS => Self::ReapStatus,
            PROC_REAP_GETPIDS => Self::ReapGetPids,
            PROC_REAP_KILL => Self::ReapKill,
            PROC_TRACE_CTL => Self::TraceCtl,
            PROC_TRACE_STATUS => Self::TraceStatus,
            _ => return None,
        })
    }

    /// How the tree lock is held while the command runs.
    pub fn lock_mode(self) -> LockMode {
        match self {
            Self::ReapAcquire | Self::ReapRelease => LockMode::Exclusive,
            Self::TraceStatus => LockMode::Unlocked,
            _ => LockMode::Shared,
        }
    }

    /// Commands that only accept a single process as target.
    pub fn is_pid_only(self) -> bool {
        !matches!(self, Self::SetProtection | Self::TraceCtl)
    }
}

/// A command together with its request and response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcctlArg {
    /// `PPROT_*` operation and options.
    SetProtection(u32),
    ReapAcquire,
    ReapRelease,
    ReapStatus(ReaperStatus),
    ReapGetPids(ReaperPids),
    ReapKill(ReaperKill),
    /// `PROC_TRACE_CTL_*` state.
    TraceCtl(i32),
    TraceStatus(TraceStatus),
}

impl ProcctlArg {
    pub fn cmd(&self) -> ProcctlCmd {
        match self {
            Self::SetProtection(_) => ProcctlCmd::SetProtection,
            Self::ReapAcquire => ProcctlCmd::ReapAcquire,
            Self::ReapRelease => ProcctlCmd::ReapRelease,
            Self::ReapStatus(_) => ProcctlCmd::ReapStatus,
            Self::ReapGetPids(_) => ProcctlCmd::ReapGetPids,
            Self::ReapKill(_) => ProcctlCmd::ReapKill,
            Self::TraceCtl(_) => ProcctlCmd::TraceCtl,
            Self::TraceStatus(_) => ProcctlCmd::TraceStatus,
        }
    }
}

/// Apply `arg` to the process `id`, or to every member of the process group `id`.
///
/// A group request succeeds if the command succeeded for at least one member.
/// Members that are still being created or that the caller cannot see are skipped.
/// Otherwise the first member error is returned, or `NotFound` if no member was
/// visible at all.
pub fn kern_procctl(td: &Caller, idtype: IdType, id: Pid, arg: &mut ProcctlArg) -> ProcctlResult {
    let cmd = arg.cmd();
    if cmd.is_pid_only() && idtype != IdType::Pid {
        return Err(ProcctlError::InvalidArgument);
    }

    let mut guard = td.table.lock_tree(cmd.lock_mode());
    match idtype {
        IdType::Pid => procctl_pid(td, &mut guard, id, arg),
        IdType::Pgid => procctl_pgid(td, &mut guard, id, arg),
    }
}

fn procctl_pid(
    td: &Caller,
    guard: &mut TreeGuard,
    pid: Pid,
    arg: &mut ProcctlArg,
) -> ProcctlResult {
    let process = td
        .table
        .get_process(pid)
        .filter(|process| process.state() == ProcState::Normal)
        .ok_or(ProcctlError::NotFound)?;
    if !td.policy.can_see(td.pid, &process) {
        return Err(ProcctlError::PermissionDenied);
    }
    kern_procctl_single(td, guard, &process, arg)
}

fn procctl_pgid(
    td: &Caller,
    guard: &mut TreeGuard,
    pgid: Pid,
    arg: &mut ProcctlArg,
) -> ProcctlResult {
    let group = td
        .table
        .get_process_group(pgid)
        .ok_or(ProcctlError::NotFound)?;
    let mut ok = false;
    let mut first_error = None;
    for process in group.get_processes() {
        if process.state() == ProcState::New || !td.policy.can_see(td.pid, &process) {
            continue;
        }
        match kern_procctl_single(td, guard, &process, arg) {
            Ok(()) => ok = true,
            Err(err) => {
                debug!(
                    "[procctl] group {}: {:?} failed for {}: {}",
                    pgid,
                    arg.cmd(),
                    process.get_pid(),
                    err
                );
                first_error.get_or_insert(err);
            }
        }
    }
    if ok {
        Ok(())
    } else {
        // was not able to see any processes in the process group
        Err(first_error.unwrap_or(ProcctlError::NotFound))
    }
}

fn kern_procctl_single(
    td: &Caller,
    guard: &mut TreeGuard,
    process: &Arc<Process>,
    arg: &mut ProcctlArg,
) -> ProcctlResult {
    match arg {
        ProcctlArg::SetProtection(flags) => protect_set(td, shared(guard)?, process, *flags),
        ProcctlArg::ReapAcquire => reap_acquire(td, exclusive(guard)?, process),
        ProcctlArg::ReapRelease => reap_release(td, exclusive(guard)?, process),
        ProcctlArg::ReapStatus(rs) => reap_status(td, shared(guard)?, process, rs),
        ProcctlArg::ReapGetPids(rp) => reap_getpids(td, guard, process, rp),
        ProcctlArg::ReapKill(rk) => reap_kill(td, shared(guard)?, process, rk),
        ProcctlArg::TraceCtl(state) => trace_ctl(td, process, *state),
        ProcctlArg::TraceStatus(status) => trace_status(td, process, status),
    }
}

pub(crate) fn inconsistency(what: &str, pid: Pid) -> ProcctlError {
    error!("[procctl] {} (pid {})", what, pid);
    ProcctlError::InternalInconsistency
}

fn shared<'g>(guard: &'g TreeGuard) -> ProcctlResult<&'g ProcessTree> {
    guard.tree().ok_or(ProcctlError::InternalInconsistency)
}

fn exclusive<'g>(guard: &'g mut TreeGuard) -> ProcctlResult<&'g mut ProcessTree> {
    guard.tree_mut().ok_or(ProcctlError::InternalInconsistency)
}
