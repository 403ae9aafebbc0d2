use crate::Pid;
use crate::flags::ProcFlags;
use axerrno::{LinuxError, LinuxResult};
use core::sync::atomic::{AtomicU32, Ordering};
use spin::{Mutex, MutexGuard};

/// Lifecycle state of a process record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Created by fork but not yet fully initialized.
    New,
    /// Running.
    Normal,
    /// Exited, waiting to be released by its parent.
    Zombie,
}

/// Fields guarded by the per-process record lock.
#[derive(Debug)]
pub struct ProcessInner {
    pub state: ProcState,
    pub flags: ProcFlags,
    /// The debugger attached to the process, if any.
    pub tracer: Option<Pid>,
    /// Kernel event tracing is active for the process.
    pub ktrace: bool,
    pub exit_code: i32,
}

impl ProcessInner {
    pub fn is_traced(&self) -> bool {
        self.tracer.is_some()
    }
}

pub struct Process {
    pid: Pid,
    pgid: AtomicU32,
    inner: Mutex<ProcessInner>,
}

impl Process {
    /// only can be used by the process table
    /// does nothing but initialize fields
    pub(crate) fn new(pid: Pid, pgid: Pid, state: ProcState, flags: ProcFlags) -> Self {
        Self {
            pid,
            pgid: AtomicU32::new(pgid),
            inner: Mutex::new(ProcessInner {
                state,
                flags,
                tracer: None,
                ktrace: false,
                exit_code: 0,
            }),
        }
    }

    pub fn get_pid(&self) -> Pid {
        self.pid
    }

    pub fn get_pgid(&self) -> Pid {
        self.pgid.load(Ordering::Acquire)
    }

    pub(crate) fn set_pgid(&self, pgid: Pid) {
        self.pgid.store(pgid, Ordering::Release);
    }

    /// Acquire the record lock.
    ///
    /// Callers that also need the tree lock must take it first.
    pub fn lock(&self) -> MutexGuard<'_, ProcessInner> {
        self.inner.lock()
    }

    pub fn state(&self) -> ProcState {
        self.inner.lock().state
    }

    pub fn is_zombie(&self) -> bool {
        self.state() == ProcState::Zombie
    }

    pub fn flags(&self) -> ProcFlags {
        self.inner.lock().flags
    }

    pub fn is_traced(&self) -> bool {
        self.inner.lock().is_traced()
    }

    pub fn tracer(&self) -> Option<Pid> {
        self.inner.lock().tracer
    }

    /// Finish initialization of a process created by
    /// [`ProcTable::fork_embryo`](crate::ProcTable::fork_embryo).
    pub fn make_runnable(&self) -> LinuxResult {
        let mut inner = self.inner.lock();
        if inner.state != ProcState::New {
            return Err(LinuxError::EINVAL);
        }
        inner.state = ProcState::Normal;
        Ok(())
    }

    /// Mark the process as system-critical.
    pub fn mark_system(&self) {
        self.inner.lock().flags |= ProcFlags::SYSTEM;
    }

    /// Attach a debugger to the process.
    pub fn attach_tracer(&self, tracer: Pid) -> LinuxResult {
        let mut inner = self.inner.lock();
        if inner.state == ProcState::Zombie {
            return Err(LinuxError::ESRCH);
        }
        if inner.flags.contains(ProcFlags::NOTRACE) {
            return Err(LinuxError::EPERM);
        }
        if inner.tracer.is_some() {
            return Err(LinuxError::EBUSY);
        }
        inner.tracer = Some(tracer);
        debug!("[process] process {} traced by {}", self.pid, tracer);
        Ok(())
    }

    pub fn detach_tracer(&self) -> Option<Pid> {
        self.inner.lock().tracer.take()
    }

    pub fn set_ktrace(&self, active: bool) {
        self.inner.lock().ktrace = active;
    }

    /// Apply the exec-time attribute transitions.
    /// A `NOTRACE` requested with `NOTRACE_EXEC` expires here, a plain `NOTRACE` persists.
    pub fn exec(&self) {
        let mut inner = self.inner.lock();
        if inner.flags.contains(ProcFlags::NOTRACE_EXEC) {
            inner
                .flags
                .remove(ProcFlags::NOTRACE | ProcFlags::NOTRACE_EXEC);
        }
    }

    pub fn get_exit_code(&self) -> Option<i32> {
        let inner = self.inner.lock();
        (inner.state == ProcState::Zombie).then_some(inner.exit_code)
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("pgid", &self.get_pgid())
            .finish()
    }
}
