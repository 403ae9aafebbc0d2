//! sys_procctl:
//! # Arguments
//! - `idtype`: `P_PID` to target one process, `P_PGID` to target a process group.
//! - `id`: the process or process group id.
//! - `com`: one of the `PROC_*` commands.
//! - `data`: the command payload, already copied in from the caller. Its kind must
//!           match `com`. Response fields are filled in place.
//!
//! Only `PROC_SPROTECT` and `PROC_TRACE_CTL` accept `P_PGID`.
use crate::imp::procctl::{IdType, ProcctlArg, ProcctlCmd, kern_procctl};
use crate::policy::Caller;
use axerrno::{LinuxError, LinuxResult};
use core::ffi::c_int;
use proctree::Pid;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_procctl(
    td: &Caller,
    idtype: u32,
    id: i64,
    com: c_int,
    data: &mut ProcctlArg,
) -> LinuxResult<isize> {
    let cmd = ProcctlCmd::from_raw(com).ok_or(LinuxError::EINVAL)?;
    if data.cmd() != cmd {
        // payload does not belong to the command
        return Err(LinuxError::EINVAL);
    }
    let idtype = IdType::try_from(idtype)?;
    // no process or group can have an id outside the pid range
    let id = Pid::try_from(id).map_err(|_| LinuxError::ESRCH)?;
    kern_procctl(td, idtype, id, data)?;
    Ok(0)
}
