use axerrno::LinuxError;
use core::fmt;

/// Failure kinds of process control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcctlError {
    /// Malformed command, flags or payload.
    InvalidArgument,
    /// An authorization or ownership rule was violated.
    PermissionDenied,
    /// The target is unresolvable or invisible.
    NotFound,
    /// The target's trace state conflicts with the request.
    Busy,
    /// The caller is already a reaper.
    AlreadyActive,
    /// The caller runs in a sandbox that forbids the request.
    RestrictedContext,
    /// A snapshot buffer could not be allocated.
    NoMemory,
    /// A process hierarchy invariant does not hold. Never expected.
    InternalInconsistency,
}

pub type ProcctlResult<T = ()> = Result<T, ProcctlError>;

impl ProcctlError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "no such process",
            Self::Busy => "target busy",
            Self::AlreadyActive => "reaper already active",
            Self::RestrictedContext => "not permitted in restricted context",
            Self::NoMemory => "out of memory",
            Self::InternalInconsistency => "process tree inconsistency",
        }
    }
}

impl fmt::Display for ProcctlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ProcctlError> for LinuxError {
    fn from(err: ProcctlError) -> Self {
        match err {
            ProcctlError::InvalidArgument => LinuxError::EINVAL,
            ProcctlError::PermissionDenied => LinuxError::EPERM,
            ProcctlError::NotFound => LinuxError::ESRCH,
            ProcctlError::Busy | ProcctlError::AlreadyActive => LinuxError::EBUSY,
            // Linux has no ECAPMODE
            ProcctlError::RestrictedContext => LinuxError::EPERM,
            ProcctlError::NoMemory => LinuxError::ENOMEM,
            ProcctlError::InternalInconsistency => LinuxError::EIO,
        }
    }
}
