#![allow(dead_code)]

use procctl::imp::procctl::{IdType, ProcctlArg, kern_procctl};
use procctl::{AccessPolicy, Caller, Privilege, ProcctlError, ProcctlResult, SignalInfo, SignalSink};
use proctree::{Pid, ProcTable, Process};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A policy that allows everything except what the test denies explicitly.
#[derive(Default)]
pub struct TestPolicy {
    hidden: Mutex<BTreeSet<Pid>>,
    unschedulable: Mutex<BTreeSet<Pid>>,
    unsignalable: Mutex<BTreeSet<Pid>>,
    unprivileged: AtomicBool,
    capability_mode: AtomicBool,
}

impl TestPolicy {
    pub fn hide(&self, pid: Pid) {
        self.hidden.lock().unwrap().insert(pid);
    }

    pub fn deny_sched(&self, pid: Pid) {
        self.unschedulable.lock().unwrap().insert(pid);
    }

    pub fn deny_signal(&self, pid: Pid) {
        self.unsignalable.lock().unwrap().insert(pid);
    }

    pub fn set_unprivileged(&self, value: bool) {
        self.unprivileged.store(value, Ordering::SeqCst);
    }

    pub fn set_capability_mode(&self, value: bool) {
        self.capability_mode.store(value, Ordering::SeqCst);
    }
}

impl AccessPolicy for TestPolicy {
    fn can_see(&self, _caller: Pid, target: &Process) -> bool {
        !self.hidden.lock().unwrap().contains(&target.get_pid())
    }

    fn can_sched(&self, _caller: Pid, target: &Process) -> bool {
        !self.unschedulable.lock().unwrap().contains(&target.get_pid())
    }

    fn can_signal(&self, _caller: Pid, target: &Process, _signo: u32) -> ProcctlResult {
        if self.unsignalable.lock().unwrap().contains(&target.get_pid()) {
            Err(ProcctlError::PermissionDenied)
        } else {
            Ok(())
        }
    }

    fn has_privilege(&self, _caller: Pid, _privilege: Privilege) -> bool {
        !self.unprivileged.load(Ordering::SeqCst)
    }

    fn in_capability_mode(&self, _caller: Pid) -> bool {
        self.capability_mode.load(Ordering::SeqCst)
    }
}

/// Records every delivered signal.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(Pid, SignalInfo)>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(Pid, SignalInfo)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<Pid> {
        let mut targets: Vec<_> = self.sent().into_iter().map(|(pid, _)| pid).collect();
        targets.sort_unstable();
        targets
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl SignalSink for RecordingSink {
    fn send_signal(&self, target: &Process, info: SignalInfo) {
        self.sent.lock().unwrap().push((target.get_pid(), info));
    }
}

pub const INIT: Pid = 1;
pub const CALLER_UID: u32 = 1000;

/// A process table with its collaborators.
#[derive(Default)]
pub struct World {
    pub table: ProcTable,
    pub policy: TestPolicy,
    pub sink: RecordingSink,
}

impl World {
    pub fn new() -> Self {
        init_logger();
        Self::default()
    }

    pub fn caller(&self, pid: Pid) -> Caller<'_> {
        Caller::new(pid, CALLER_UID, &self.table, &self.policy, &self.sink)
    }

    pub fn fork(&self, parent: Pid) -> Pid {
        self.table.fork(parent).unwrap().get_pid()
    }

    pub fn process(&self, pid: Pid) -> Arc<Process> {
        self.table.get_process(pid).unwrap()
    }

    /// Run `arg` as `caller` against the single process `target`.
    pub fn ctl(
        &self,
        caller: Pid,
        target: Pid,
        mut arg: ProcctlArg,
    ) -> (ProcctlResult, ProcctlArg) {
        let result = kern_procctl(&self.caller(caller), IdType::Pid, target, &mut arg);
        (result, arg)
    }

    /// Run `arg` as `caller` against every member of process group `pgid`.
    pub fn ctl_group(
        &self,
        caller: Pid,
        pgid: Pid,
        mut arg: ProcctlArg,
    ) -> (ProcctlResult, ProcctlArg) {
        let result = kern_procctl(&self.caller(caller), IdType::Pgid, pgid, &mut arg);
        (result, arg)
    }

    pub fn acquire(&self, pid: Pid) -> ProcctlResult {
        self.ctl(pid, pid, ProcctlArg::ReapAcquire).0
    }

    pub fn release(&self, pid: Pid) -> ProcctlResult {
        self.ctl(pid, pid, ProcctlArg::ReapRelease).0
    }

    pub fn is_consistent(&self) -> bool {
        self.table.tree().is_consistent()
    }
}
