use crate::Pid;
use crate::process::Process;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

pub struct ProcessGroup {
    pgid: Pid,
    processes: Mutex<BTreeMap<Pid, Arc<Process>>>,
}

impl ProcessGroup {
    /// Create an empty process group with the given process group id
    pub(crate) fn new(pgid: Pid) -> Arc<Self> {
        Arc::new(Self {
            pgid,
            processes: Mutex::new(BTreeMap::new()),
        })
    }

    /// Get process group id
    pub fn get_pgid(&self) -> Pid {
        self.pgid
    }

    /// Get the leader process of the process group
    /// Return `None` if the leader process does not exist (maybe exited)
    pub fn get_leader(&self) -> Option<Arc<Process>> {
        // "leader" process is the process with the same id as the process group id
        self.processes.lock().get(&self.pgid).cloned()
    }

    pub(crate) fn add_process(&self, process: Arc<Process>) {
        self.processes.lock().insert(process.get_pid(), process);
    }

    /// Remove a member, returns whether the group became empty
    pub(crate) fn remove_process(&self, pid: Pid) -> bool {
        let mut processes = self.processes.lock();
        processes.remove(&pid);
        processes.is_empty()
    }

    /// Snapshot of the current members, in pid order
    pub fn get_processes(&self) -> Vec<Arc<Process>> {
        self.processes.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }
}

impl core::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("pgid", &self.pgid)
            .field("members", &self.len())
            .finish()
    }
}
