use super::inconsistency;
use crate::error::{ProcctlError, ProcctlResult};
use crate::policy::Caller;
use proctree::{Pid, ProcFlags, Process};

pub const PROC_TRACE_CTL_ENABLE: i32 = 1;
pub const PROC_TRACE_CTL_DISABLE: i32 = 2;
pub const PROC_TRACE_CTL_DISABLE_EXEC: i32 = 3;

/// Response of `PROC_TRACE_STATUS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraceStatus {
    #[default]
    NotTraced,
    /// Tracing is disabled for the process.
    Untraceable,
    /// The process is traced by the given debugger.
    TracedBy(Pid),
}

impl TraceStatus {
    /// The raw status word: 0, -1, or the tracer pid.
    pub fn as_raw(self) -> i64 {
        match self {
            Self::NotTraced => 0,
            Self::Untraceable => -1,
            Self::TracedBy(pid) => pid as i64,
        }
    }
}

/// `PROC_TRACE_CTL`: allow or refuse tracing of `process`.
///
/// The request is refused while the process is traced in any way, so the caller has
/// to query the state first. Only a process itself can re-enable tracing, or turn
/// a disable-until-exec into a permanent disable.
pub fn trace_ctl(td: &Caller, process: &Process, state: i32) -> ProcctlResult {
    let mut inner = process.lock();
    if inner.is_traced() || inner.ktrace {
        return Err(ProcctlError::Busy);
    }

    match state {
        PROC_TRACE_CTL_ENABLE => {
            if !td.is(process) {
                return Err(ProcctlError::PermissionDenied);
            }
            inner
                .flags
                .remove(ProcFlags::NOTRACE | ProcFlags::NOTRACE_EXEC);
        }
        PROC_TRACE_CTL_DISABLE_EXEC => {
            inner.flags |= ProcFlags::NOTRACE | ProcFlags::NOTRACE_EXEC;
        }
        PROC_TRACE_CTL_DISABLE => {
            if inner.flags.contains(ProcFlags::NOTRACE_EXEC) {
                if !inner.flags.contains(ProcFlags::NOTRACE) {
                    return Err(inconsistency("dangling NOTRACE_EXEC", process.get_pid()));
                }
                if !td.is(process) {
                    return Err(ProcctlError::PermissionDenied);
                }
                inner.flags.remove(ProcFlags::NOTRACE_EXEC);
            } else {
                inner.flags |= ProcFlags::NOTRACE;
            }
        }
        _ => return Err(ProcctlError::InvalidArgument),
    }
    Ok(())
}

/// `PROC_TRACE_STATUS`: report whether `process` is traceable and by whom it is traced.
pub fn trace_status(_td: &Caller, process: &Process, status: &mut TraceStatus) -> ProcctlResult {
    let inner = process.lock();
    *status = if inner.flags.contains(ProcFlags::NOTRACE) {
        if inner.is_traced() {
            return Err(inconsistency("traced but tracing disabled", process.get_pid()));
        }
        TraceStatus::Untraceable
    } else if let Some(tracer) = inner.tracer {
        TraceStatus::TracedBy(tracer)
    } else {
        TraceStatus::NotTraced
    };
    Ok(())
}
