use crate::Pid;
use crate::config::{INIT_PID, TableConfig};
use crate::flags::ProcFlags;
use crate::process::{ProcState, Process};
use crate::process_group::ProcessGroup;
use crate::tree::{LockMode, ProcessTree, TreeGuard};
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use core::sync::atomic::{AtomicU32, Ordering};
use spin::{Mutex, RwLock, RwLockReadGuard};

/// All processes of a system: the tree arena behind the tree lock, plus the pid and
/// process group lookup tables.
pub struct ProcTable {
    config: TableConfig,
    tree: RwLock<ProcessTree>,
    processes: Mutex<BTreeMap<Pid, Arc<Process>>>,
    groups: Mutex<BTreeMap<Pid, Arc<ProcessGroup>>>,
    next_pid: AtomicU32,
}

impl ProcTable {
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    /// Create a table holding only the init process.
    pub fn with_config(config: TableConfig) -> Self {
        let init = Arc::new(Process::new(
            INIT_PID,
            INIT_PID,
            ProcState::Normal,
            ProcFlags::empty(),
        ));
        let group = ProcessGroup::new(INIT_PID);
        group.add_process(init.clone());
        let mut processes = BTreeMap::new();
        processes.insert(INIT_PID, init.clone());
        let mut groups = BTreeMap::new();
        groups.insert(INIT_PID, group);
        Self {
            config,
            tree: RwLock::new(ProcessTree::new(init)),
            processes: Mutex::new(processes),
            groups: Mutex::new(groups),
            next_pid: AtomicU32::new(INIT_PID + 1),
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn init_pid(&self) -> Pid {
        INIT_PID
    }

    /// Take the tree lock in `mode`.
    pub fn lock_tree(&self, mode: LockMode) -> TreeGuard<'_> {
        TreeGuard::new(&self.tree, mode)
    }

    /// Shared access to the tree, for inspection.
    pub fn tree(&self) -> RwLockReadGuard<'_, ProcessTree> {
        self.tree.read()
    }

    /// Look up a process in any state.
    pub fn get_process(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.lock().get(&pid).cloned()
    }

    pub fn get_all_processes(&self) -> Vec<Arc<Process>> {
        self.processes.lock().values().cloned().collect()
    }

    pub fn get_process_group(&self, pgid: Pid) -> Option<Arc<ProcessGroup>> {
        self.groups.lock().get(&pgid).cloned()
    }

    /// Pids are handed out in increasing order and never reused, so a lower pid is
    /// always an older process. Once `pid_max` is reached every fork fails.
    fn generate_next_pid(&self) -> LinuxResult<Pid> {
        let pid_max = self.config.pid_max;
        self.next_pid
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pid| {
                (pid <= pid_max).then_some(pid + 1)
            })
            .map_err(|_| {
                warn!("[process] pid space exhausted (pid_max = {})", pid_max);
                LinuxError::EAGAIN
            })
    }

    /// Create a child of `parent` and leave it in [`ProcState::New`].
    ///
    /// The child joins the parent's process group, inherits the parent's trace
    /// restrictions, and is born protected if the parent has `INHERIT_PROTECTED`.
    pub fn fork_embryo(&self, parent: Pid) -> LinuxResult<Arc<Process>> {
        let mut tree = self.tree.write();
        let parent_process = tree.process(parent).cloned().ok_or(LinuxError::ESRCH)?;
        let flags = {
            let inner = parent_process.lock();
            if inner.state == ProcState::Zombie {
                return Err(LinuxError::ESRCH);
            }
            inner.flags.inherited()
        };
        // group changes take the tree lock, so the group cannot go away until we are done
        let pgid = parent_process.get_pgid();
        let group = self.get_process_group(pgid).ok_or_else(|| {
            error!("[process] process {} is in missing group {}", parent, pgid);
            LinuxError::ESRCH
        })?;
        let pid = self.generate_next_pid()?;
        let child = Arc::new(Process::new(pid, pgid, ProcState::New, flags));
        tree.insert(parent, child.clone())?;
        group.add_process(child.clone());
        self.processes.lock().insert(pid, child.clone());
        Ok(child)
    }

    /// Create a fully initialized child of `parent`.
    pub fn fork(&self, parent: Pid) -> LinuxResult<Arc<Process>> {
        let child = self.fork_embryo(parent)?;
        child.make_runnable()?;
        info!("[process] process {} forked {}", parent, child.get_pid());
        Ok(child)
    }

    /// Turn `pid` into a zombie and hand its descendants over.
    ///
    /// If the process is a reaper, its reap list goes to its own reaper first. Every
    /// direct child is then reparented to the child's reaper. Processes traced by
    /// `pid` are detached. The zombie itself stays linked until [`ProcTable::release`].
    pub fn exit(&self, pid: Pid, exit_code: i32) -> LinuxResult {
        if pid == INIT_PID {
            return Err(LinuxError::EPERM);
        }
        let mut tree = self.tree.write();
        let process = tree.process(pid).cloned().ok_or(LinuxError::ESRCH)?;
        {
            let mut inner = process.lock();
            if inner.state == ProcState::Zombie {
                return Err(LinuxError::ESRCH);
            }
            inner.state = ProcState::Zombie;
            inner.exit_code = exit_code;
            inner.tracer = None;
        }
        for tracee in tree.processes() {
            let mut inner = tracee.lock();
            if inner.tracer == Some(pid) {
                inner.tracer = None;
                debug!(
                    "[process] process {} detached from exited tracer {}",
                    tracee.get_pid(),
                    pid
                );
            }
        }
        tree.abandon_children(pid);
        tree.reparent_children(pid);
        info!("[process] process {} exited with code {}", pid, exit_code);
        Ok(())
    }

    /// Remove a zombie from the tree, the pid table and its process group.
    pub fn release(&self, pid: Pid) -> LinuxResult {
        let mut tree = self.tree.write();
        let process = tree.process(pid).cloned().ok_or(LinuxError::ESRCH)?;
        if !process.is_zombie() {
            return Err(LinuxError::EINVAL);
        }
        tree.remove(pid).ok_or(LinuxError::ESRCH)?;
        self.leave_group(&process);
        self.processes.lock().remove(&pid);
        debug!("[process] process {} released", pid);
        Ok(())
    }

    fn leave_group(&self, process: &Process) {
        let mut groups = self.groups.lock();
        let pgid = process.get_pgid();
        let empty = groups
            .get(&pgid)
            .is_some_and(|group| group.remove_process(process.get_pid()));
        if empty {
            // if the process group is empty, remove it from the process group table
            groups.remove(&pgid);
        }
    }

    /// Callers hold the tree lock exclusively.
    fn change_group(&self, process: &Arc<Process>, new_group: &Arc<ProcessGroup>) {
        self.leave_group(process);
        new_group.add_process(process.clone());
        process.set_pgid(new_group.get_pgid());
    }

    /// Create a new process group led by `pid`.
    /// Return the current process group if the process already leads it.
    pub fn create_group(&self, pid: Pid) -> LinuxResult<Arc<ProcessGroup>> {
        let _tree = self.tree.write();
        let process = self.get_process(pid).ok_or(LinuxError::ESRCH)?;
        if process.is_zombie() {
            return Err(LinuxError::ESRCH);
        }
        if process.get_pgid() == pid {
            if let Some(group) = self.get_process_group(pid) {
                return Ok(group);
            }
        }
        if self.groups.lock().contains_key(&pid) {
            return Err(LinuxError::EPERM);
        }
        let new_group = ProcessGroup::new(pid);
        self.change_group(&process, &new_group);
        self.groups.lock().insert(pid, new_group.clone());
        Ok(new_group)
    }

    /// Move `pid` into the existing process group `pgid`.
    pub fn move_to_group(&self, pid: Pid, pgid: Pid) -> LinuxResult {
        let _tree = self.tree.write();
        let process = self.get_process(pid).ok_or(LinuxError::ESRCH)?;
        if process.is_zombie() {
            return Err(LinuxError::ESRCH);
        }
        if process.get_pgid() == pgid {
            return Ok(());
        }
        let new_group = self.get_process_group(pgid).ok_or(LinuxError::ESRCH)?;
        self.change_group(&process, &new_group);
        Ok(())
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}
