use crate::Pid;

/// The pid of the init process, the permanent root reaper.
pub const INIT_PID: Pid = 1;

/// Largest pid handed out by the default configuration.
pub const PID_MAX: Pid = 99_999;

/// Tunables of a [`ProcTable`](crate::ProcTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// `fork` fails with `EAGAIN` once the next pid would exceed this value.
    pub pid_max: Pid,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { pid_max: PID_MAX }
    }
}
