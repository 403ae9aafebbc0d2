use super::inconsistency;
use crate::error::{ProcctlError, ProcctlResult};
use crate::policy::{Caller, SignalInfo};
use alloc::vec::Vec;
use bitflags::bitflags;
use linux_raw_sys::general::{_NSIG, SI_USER};
use proctree::{Pid, Process, ProcessTree};

bitflags! {
    /// Flags of a [`ReaperKill`] request.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ReaperKillFlags: u32 {
        /// Only signal the direct children of the reaper.
        const CHILDREN = 0x1;
        /// Only signal processes whose subtree tag equals `subtree`.
        const SUBTREE = 0x2;
    }
}

/// Request and response of `PROC_REAP_KILL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaperKill {
    pub sig: u32,
    pub flags: ReaperKillFlags,
    pub subtree: u32,
    /// Number of processes signalled.
    pub killed: u32,
    /// The first process that could not be signalled, reported only when none could.
    pub fpid: Option<Pid>,
}

impl ReaperKill {
    pub fn new(sig: u32, flags: ReaperKillFlags, subtree: u32) -> Self {
        Self {
            sig,
            flags,
            subtree,
            ..Default::default()
        }
    }
}

/// `PROC_REAP_KILL`: signal the subtree of the reaper responsible for `process`.
///
/// Every candidate the caller may signal is signalled, failures do not stop the walk.
/// The call succeeds if at least one process was signalled. Otherwise it fails with
/// the error of the first refused candidate, or `NotFound` if there was no candidate.
pub fn reap_kill(
    td: &Caller,
    tree: &ProcessTree,
    process: &Process,
    rk: &mut ReaperKill,
) -> ProcctlResult {
    if td.policy.in_capability_mode(td.pid) {
        return Err(ProcctlError::RestrictedContext);
    }
    if rk.sig == 0 || rk.sig > _NSIG {
        return Err(ProcctlError::InvalidArgument);
    }
    if !ReaperKillFlags::all().contains(rk.flags) {
        return Err(ProcctlError::InvalidArgument);
    }

    let pid = process.get_pid();
    let reap = tree
        .effective_reaper(pid)
        .ok_or_else(|| inconsistency("live process missing from the tree", pid))?;
    let info = SignalInfo {
        signo: rk.sig,
        code: SI_USER,
        pid: td.pid,
        uid: td.uid,
    };

    let candidates: Vec<Pid> = if rk.flags.contains(ReaperKillFlags::CHILDREN) {
        tree.children(reap).collect()
    } else {
        tree.reap_list(reap).collect()
    };

    rk.killed = 0;
    rk.fpid = None;
    let mut first_failure = None;
    for candidate in candidates {
        let Some(node) = tree.node(candidate) else {
            continue;
        };
        if rk.flags.contains(ReaperKillFlags::SUBTREE) && node.reap_subtree() != rk.subtree {
            continue;
        }
        let target = node.process();
        match td.policy.can_signal(td.pid, target, rk.sig) {
            Ok(()) => {
                td.signals.send_signal(target, info);
                rk.killed += 1;
            }
            Err(err) => {
                if rk.killed == 0 && first_failure.is_none() {
                    first_failure = Some((candidate, err));
                }
            }
        }
        // do not end the loop on error, signal everything we can
    }

    if rk.killed > 0 {
        debug!(
            "[procctl] reaper {}: signal {} sent to {} processes",
            reap, rk.sig, rk.killed
        );
        return Ok(());
    }
    match first_failure {
        Some((fpid, err)) => {
            rk.fpid = Some(fpid);
            Err(err)
        }
        None => Err(ProcctlError::NotFound),
    }
}
