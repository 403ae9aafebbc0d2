use super::inconsistency;
use crate::error::{ProcctlError, ProcctlResult};
use crate::policy::{Caller, Privilege};
use bitflags::bitflags;
use proctree::{Pid, ProcFlags, Process, ProcessTree};

pub const PPROT_SET: u32 = 1;
pub const PPROT_CLEAR: u32 = 2;
pub const PPROT_DESCEND: u32 = 0x10;
pub const PPROT_INHERIT: u32 = 0x20;

const PPROT_OP_MASK: u32 = 0xf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectOp {
    Set,
    Clear,
}

bitflags! {
    /// Options for use with [`protect_set`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ProtectOptions: u32 {
        /// Apply to the whole subtree rooted at the target, the target included.
        const DESCEND = PPROT_DESCEND;
        /// Also make future children of the affected processes inherit protection.
        const INHERIT = PPROT_INHERIT;
    }
}

fn parse_flags(flags: u32) -> ProcctlResult<(ProtectOp, ProtectOptions)> {
    let op = match flags & PPROT_OP_MASK {
        PPROT_SET => ProtectOp::Set,
        PPROT_CLEAR => ProtectOp::Clear,
        _ => return Err(ProcctlError::InvalidArgument),
    };
    let options =
        ProtectOptions::from_bits(flags & !PPROT_OP_MASK).ok_or(ProcctlError::InvalidArgument)?;
    Ok((op, options))
}

/// Change the protection of one process.
/// System processes and processes the caller may not schedule are left alone.
///
/// Returns whether the process was changed.
fn protect_setchild(
    td: &Caller,
    process: &Process,
    op: ProtectOp,
    options: ProtectOptions,
) -> bool {
    if !td.policy.can_sched(td.pid, process) {
        return false;
    }
    let mut inner = process.lock();
    if inner.flags.contains(ProcFlags::SYSTEM) {
        return false;
    }
    match op {
        ProtectOp::Set => {
            inner.flags |= ProcFlags::PROTECTED;
            if options.contains(ProtectOptions::INHERIT) {
                inner.flags |= ProcFlags::INHERIT_PROTECTED;
            }
        }
        ProtectOp::Clear => {
            inner
                .flags
                .remove(ProcFlags::PROTECTED | ProcFlags::INHERIT_PROTECTED);
        }
    }
    true
}

/// Change the protection of `top` and all of its descendants.
///
/// The walk is iterative pre-order: after visiting a process descend to its first
/// child, otherwise move on to the next sibling, climbing back up the tree (but never
/// past `top`) until one is found.
fn protect_setchildren(
    td: &Caller,
    tree: &ProcessTree,
    top: Pid,
    op: ProtectOp,
    options: ProtectOptions,
) -> ProcctlResult<bool> {
    let mut pid = top;
    let mut ret = false;
    loop {
        let process = tree
            .process(pid)
            .ok_or_else(|| inconsistency("protect walk reached a missing process", pid))?;
        ret |= protect_setchild(td, process, op, options);

        if let Some(child) = tree.first_child(pid) {
            pid = child;
            continue;
        }
        loop {
            if pid == top {
                return Ok(ret);
            }
            if let Some(sibling) = tree.next_sibling(pid) {
                pid = sibling;
                break;
            }
            pid = tree
                .parent(pid)
                .ok_or_else(|| inconsistency("protect walk left the tree", pid))?;
        }
    }
}

/// `PROC_SPROTECT`: set or clear the protection of a process or of its subtree.
///
/// Fails with `PermissionDenied` if no process could be changed.
pub fn protect_set(
    td: &Caller,
    tree: &ProcessTree,
    process: &Process,
    flags: u32,
) -> ProcctlResult {
    let (op, options) = parse_flags(flags)?;
    if !td.policy.has_privilege(td.pid, Privilege::VmMadvProtect) {
        return Err(ProcctlError::PermissionDenied);
    }

    let changed = if options.contains(ProtectOptions::DESCEND) {
        protect_setchildren(td, tree, process.get_pid(), op, options)?
    } else {
        protect_setchild(td, process, op, options)
    };
    if changed {
        Ok(())
    } else {
        Err(ProcctlError::PermissionDenied)
    }
}
