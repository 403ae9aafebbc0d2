use super::inconsistency;
use crate::error::{ProcctlError, ProcctlResult};
use crate::policy::Caller;
use alloc::vec::Vec;
use bitflags::bitflags;
use proctree::{Pid, Process, ProcessTree, TreeGuard};

bitflags! {
    /// Flags of a [`ReaperStatus`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ReaperStatusFlags: u32 {
        /// The target itself is a reaper.
        const OWNED = 0x1;
        /// The reaper is init.
        const REALINIT = 0x2;
    }
}

bitflags! {
    /// Flags of a [`ReaperPidInfo`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PidInfoFlags: u32 {
        /// The entry is filled in.
        const VALID = 0x1;
        /// The process is a direct child of the reaper.
        const CHILD = 0x2;
    }
}

/// Response of `PROC_REAP_STATUS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaperStatus {
    pub flags: ReaperStatusFlags,
    /// Number of direct children of the reaper that are in its reap list.
    pub children: u32,
    /// Number of processes in the reap list of the reaper.
    pub descendants: u32,
    pub reaper: Pid,
    /// The oldest direct child of the reaper, `None` if its reap list is empty.
    pub pid: Option<Pid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperPidInfo {
    pub pid: Pid,
    pub subtree: u32,
    pub flags: PidInfoFlags,
}

/// Request and response of `PROC_REAP_GETPIDS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaperPids {
    /// Maximum number of entries to return.
    pub count: u32,
    pub pids: Vec<ReaperPidInfo>,
}

impl ReaperPids {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            pids: Vec::new(),
        }
    }
}

/// `PROC_REAP_ACQUIRE`: the calling process becomes a reaper.
///
/// Descendants already assigned to another reaper are not migrated, only processes
/// created below the caller from now on are assigned to it.
pub fn reap_acquire(td: &Caller, tree: &mut ProcessTree, process: &Process) -> ProcctlResult {
    if !td.is(process) {
        return Err(ProcctlError::PermissionDenied);
    }
    let pid = process.get_pid();
    if tree.is_reaper(pid) {
        return Err(ProcctlError::AlreadyActive);
    }
    if !tree.acquire_reaper(pid) {
        return Err(inconsistency("reaper acquire on an unlinked process", pid));
    }
    info!("[procctl] process {} became a reaper", pid);
    Ok(())
}

/// `PROC_REAP_RELEASE`: the calling process stops being a reaper and its reap list is
/// handed to its own reaper.
pub fn reap_release(td: &Caller, tree: &mut ProcessTree, process: &Process) -> ProcctlResult {
    if !td.is(process) {
        return Err(ProcctlError::PermissionDenied);
    }
    let pid = process.get_pid();
    if pid == tree.init_pid() || !tree.is_reaper(pid) {
        return Err(ProcctlError::InvalidArgument);
    }
    let moved = tree.abandon_children(pid);
    info!(
        "[procctl] process {} released reaper status, {} processes reassigned",
        pid, moved
    );
    Ok(())
}

/// `PROC_REAP_STATUS`: describe the reaper responsible for `process`.
pub fn reap_status(
    _td: &Caller,
    tree: &ProcessTree,
    process: &Process,
    rs: &mut ReaperStatus,
) -> ProcctlResult {
    *rs = ReaperStatus::default();
    let pid = process.get_pid();
    let reap = if tree.is_reaper(pid) {
        rs.flags |= ReaperStatusFlags::OWNED;
        pid
    } else {
        tree.reaper(pid)
            .ok_or_else(|| inconsistency("live process missing from the tree", pid))?
    };
    if reap == tree.init_pid() {
        rs.flags |= ReaperStatusFlags::REALINIT;
    }
    rs.reaper = reap;

    for member in tree.reap_members(reap) {
        if member.parent() == Some(reap) {
            rs.children += 1;
        }
        rs.descendants += 1;
    }
    if rs.descendants > 0 {
        let oldest = tree
            .first_child(reap)
            .ok_or_else(|| inconsistency("reaper with descendants but no children", reap))?;
        rs.pid = Some(oldest);
    }
    Ok(())
}

/// `PROC_REAP_GETPIDS`: snapshot the reap list of the reaper responsible for `process`.
///
/// The list is counted, the tree lock is dropped while the snapshot buffer is
/// allocated, and the list is walked again after relocking. The result is therefore
/// best-effort: it never holds more than `rp.count` entries, and every entry was a
/// member of the reap list at some point during the call, but members may have come
/// and gone in between.
pub fn reap_getpids(
    _td: &Caller,
    guard: &mut TreeGuard,
    process: &Process,
    rp: &mut ReaperPids,
) -> ProcctlResult {
    let pid = process.get_pid();
    let (reap, count) = {
        let tree = guard.tree().ok_or(ProcctlError::InternalInconsistency)?;
        let reap = tree
            .effective_reaper(pid)
            .ok_or_else(|| inconsistency("live process missing from the tree", pid))?;
        (reap, tree.reap_list(reap).count())
    };
    let n = count.min(rp.count as usize);

    let mut pids = Vec::new();
    guard
        .unlocked(|| pids.try_reserve_exact(n))
        .map_err(|_| ProcctlError::NoMemory)?;

    let tree = guard.tree().ok_or(ProcctlError::InternalInconsistency)?;
    pids.extend(tree.reap_members(reap).take(n).map(|member| {
        let mut flags = PidInfoFlags::VALID;
        if member.parent() == Some(reap) {
            flags |= PidInfoFlags::CHILD;
        }
        ReaperPidInfo {
            pid: member.pid(),
            subtree: member.reap_subtree(),
            flags,
        }
    }));
    rp.pids = pids;
    Ok(())
}
