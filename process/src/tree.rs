//! The process hierarchy arena and the tree lock.
//!
//! Every structural relation between processes is kept here as plain pid sets:
//! the parent's `children`, the reaper's `reap_list`, and the reaper and parent
//! back-links. All of them are only mutated through `&mut ProcessTree`, which can
//! only be obtained while holding the tree lock exclusively.

use crate::Pid;
use crate::process::Process;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use core::ops::Bound;
use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct TreeNode {
    process: Arc<Process>,
    parent: Option<Pid>,
    children: BTreeSet<Pid>,
    reaper: Pid,
    is_reaper: bool,
    reap_list: BTreeSet<Pid>,
    reap_subtree: u32,
}

impl TreeNode {
    pub fn process(&self) -> &Arc<Process> {
        &self.process
    }

    pub fn pid(&self) -> Pid {
        self.process.get_pid()
    }

    /// The real parent, `None` only for init.
    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = Pid> + '_ {
        self.children.iter().copied()
    }

    /// The reaper responsible for this process. Init is its own reaper.
    pub fn reaper(&self) -> Pid {
        self.reaper
    }

    pub fn is_reaper(&self) -> bool {
        self.is_reaper
    }

    pub fn reap_subtree(&self) -> u32 {
        self.reap_subtree
    }
}

pub struct ProcessTree {
    nodes: BTreeMap<Pid, TreeNode>,
    init: Pid,
}

impl ProcessTree {
    pub(crate) fn new(init: Arc<Process>) -> Self {
        let pid = init.get_pid();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            pid,
            TreeNode {
                process: init,
                parent: None,
                children: BTreeSet::new(),
                reaper: pid,
                is_reaper: true,
                reap_list: BTreeSet::new(),
                reap_subtree: pid,
            },
        );
        Self { nodes, init: pid }
    }

    /// The permanent root reaper.
    pub fn init_pid(&self) -> Pid {
        self.init
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.nodes.contains_key(&pid)
    }

    pub fn node(&self, pid: Pid) -> Option<&TreeNode> {
        self.nodes.get(&pid)
    }

    pub fn process(&self, pid: Pid) -> Option<&Arc<Process>> {
        self.nodes.get(&pid).map(|node| &node.process)
    }

    /// Every linked process, zombies included, in pid order.
    pub fn processes(&self) -> impl Iterator<Item = &Arc<Process>> + '_ {
        self.nodes.values().map(|node| &node.process)
    }

    pub fn parent(&self, pid: Pid) -> Option<Pid> {
        self.nodes.get(&pid)?.parent
    }

    /// Direct children in creation order. Empty for an unknown pid.
    pub fn children(&self, pid: Pid) -> impl Iterator<Item = Pid> + '_ {
        self.nodes
            .get(&pid)
            .into_iter()
            .flat_map(|node| node.children.iter().copied())
    }

    pub fn first_child(&self, pid: Pid) -> Option<Pid> {
        self.nodes.get(&pid)?.children.first().copied()
    }

    /// The sibling created right after `pid`, if any.
    pub fn next_sibling(&self, pid: Pid) -> Option<Pid> {
        let parent = self.parent(pid)?;
        self.nodes
            .get(&parent)?
            .children
            .range((Bound::Excluded(pid), Bound::Unbounded))
            .next()
            .copied()
    }

    pub fn reaper(&self, pid: Pid) -> Option<Pid> {
        self.nodes.get(&pid).map(|node| node.reaper)
    }

    pub fn is_reaper(&self, pid: Pid) -> bool {
        self.nodes.get(&pid).is_some_and(|node| node.is_reaper)
    }

    /// The reaper whose reap list describes the subtree of `pid`:
    /// `pid` itself if it is a reaper, its assigned reaper otherwise.
    pub fn effective_reaper(&self, pid: Pid) -> Option<Pid> {
        let node = self.nodes.get(&pid)?;
        Some(if node.is_reaper { pid } else { node.reaper })
    }

    pub fn reap_subtree(&self, pid: Pid) -> Option<u32> {
        self.nodes.get(&pid).map(|node| node.reap_subtree)
    }

    /// Pids currently assigned to `reaper`. Empty for an unknown pid.
    pub fn reap_list(&self, reaper: Pid) -> impl Iterator<Item = Pid> + '_ {
        self.nodes
            .get(&reaper)
            .into_iter()
            .flat_map(|node| node.reap_list.iter().copied())
    }

    /// Nodes currently assigned to `reaper`.
    pub fn reap_members(&self, reaper: Pid) -> impl Iterator<Item = &TreeNode> + '_ {
        self.reap_list(reaper)
            .filter_map(move |pid| self.nodes.get(&pid))
    }

    /// Whether `ancestor` is a strict ancestor of `pid`.
    pub fn is_descendant(&self, pid: Pid, ancestor: Pid) -> bool {
        let mut current = self.parent(pid);
        // A well-formed tree is never deeper than its size.
        for _ in 0..self.nodes.len() {
            match current {
                Some(p) if p == ancestor => return true,
                Some(p) => current = self.parent(p),
                None => return false,
            }
        }
        false
    }

    /// Link a newly created process below `parent`.
    ///
    /// The child is assigned to the parent if the parent is a reaper, otherwise to the
    /// parent's reaper. Its subtree tag is its own pid in the former case and the
    /// parent's tag in the latter.
    pub(crate) fn insert(&mut self, parent: Pid, process: Arc<Process>) -> LinuxResult {
        let pid = process.get_pid();
        if self.nodes.contains_key(&pid) {
            return Err(LinuxError::EEXIST);
        }
        let parent_node = self.nodes.get(&parent).ok_or(LinuxError::ESRCH)?;
        let (reaper, reap_subtree) = if parent_node.is_reaper {
            (parent, pid)
        } else {
            (parent_node.reaper, parent_node.reap_subtree)
        };
        if !self.nodes.contains_key(&reaper) {
            return Err(LinuxError::ESRCH);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(pid);
        }
        if let Some(node) = self.nodes.get_mut(&reaper) {
            node.reap_list.insert(pid);
        }
        self.nodes.insert(
            pid,
            TreeNode {
                process,
                parent: Some(parent),
                children: BTreeSet::new(),
                reaper,
                is_reaper: false,
                reap_list: BTreeSet::new(),
                reap_subtree,
            },
        );
        Ok(())
    }

    /// Mark `pid` as a reaper for processes created (or orphaned) below it from now on.
    /// Descendants already assigned to another reaper stay where they are.
    ///
    /// Returns `false` if `pid` is unknown or already a reaper.
    pub fn acquire_reaper(&mut self, pid: Pid) -> bool {
        match self.nodes.get_mut(&pid) {
            Some(node) if !node.is_reaper => {
                node.is_reaper = true;
                true
            }
            _ => false,
        }
    }

    /// Give up the reaper role of `pid`: every process in its reap list is reassigned to
    /// the reaper of `pid` with its subtree tag unchanged.
    ///
    /// Returns the number of reassigned processes. Init never abandons its children.
    pub fn abandon_children(&mut self, pid: Pid) -> usize {
        if pid == self.init {
            return 0;
        }
        let Some(node) = self.nodes.get_mut(&pid) else {
            return 0;
        };
        if !node.is_reaper {
            return 0;
        }
        node.is_reaper = false;
        let new_reaper = node.reaper;
        let members = core::mem::take(&mut node.reap_list);
        let moved = members.len();
        for member in &members {
            if let Some(node) = self.nodes.get_mut(member) {
                node.reaper = new_reaper;
            }
        }
        if let Some(node) = self.nodes.get_mut(&new_reaper) {
            node.reap_list.extend(members);
        }
        debug!(
            "[process] reaper {} abandoned {} processes to {}",
            pid, moved, new_reaper
        );
        moved
    }

    /// Move every direct child of `pid` below its own reaper.
    pub(crate) fn reparent_children(&mut self, pid: Pid) {
        let Some(node) = self.nodes.get_mut(&pid) else {
            return;
        };
        // `children` of the origin process will be cleared
        for child in core::mem::take(&mut node.children) {
            let Some(new_parent) = self.nodes.get(&child).map(|node| node.reaper) else {
                continue;
            };
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = Some(new_parent);
            }
            if let Some(node) = self.nodes.get_mut(&new_parent) {
                node.children.insert(child);
            }
        }
    }

    /// Unlink `pid` from its parent and its reaper.
    pub(crate) fn remove(&mut self, pid: Pid) -> Option<TreeNode> {
        if pid == self.init {
            return None;
        }
        let node = self.nodes.remove(&pid)?;
        if let Some(parent) = node.parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.remove(&pid);
        }
        if let Some(reaper) = self.nodes.get_mut(&node.reaper) {
            reaper.reap_list.remove(&pid);
        }
        Some(node)
    }

    /// Check that the reaper assignment, the reap lists and the parent/child links agree.
    pub fn is_consistent(&self) -> bool {
        self.nodes
            .iter()
            .all(|(&pid, node)| self.node_is_consistent(pid, node))
    }

    fn node_is_consistent(&self, pid: Pid, node: &TreeNode) -> bool {
        let links_ok = node
            .children
            .iter()
            .all(|child| self.parent(*child) == Some(pid))
            && node
                .reap_list
                .iter()
                .all(|member| self.reaper(*member) == Some(pid));
        if !links_ok {
            return false;
        }
        if pid == self.init {
            return node.parent.is_none() && node.reaper == pid && node.is_reaper;
        }
        let Some(parent) = node.parent.and_then(|parent| self.nodes.get(&parent)) else {
            return false;
        };
        let Some(reaper) = self.nodes.get(&node.reaper) else {
            return false;
        };
        parent.children.contains(&pid)
            && reaper.is_reaper
            && reaper.reap_list.contains(&pid)
            && self.is_descendant(pid, node.reaper)
    }
}

/// How a [`TreeGuard`] holds the tree lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Unlocked,
    Shared,
    Exclusive,
}

enum Held<'a> {
    Nothing,
    Shared(RwLockReadGuard<'a, ProcessTree>),
    Exclusive(RwLockWriteGuard<'a, ProcessTree>),
}

/// The tree lock held in a fixed [`LockMode`].
///
/// Shared access hands out `&ProcessTree`, only exclusive access hands out
/// `&mut ProcessTree`. The lock can be dropped temporarily with [`TreeGuard::unlocked`].
pub struct TreeGuard<'a> {
    lock: &'a RwLock<ProcessTree>,
    mode: LockMode,
    held: Held<'a>,
}

impl<'a> TreeGuard<'a> {
    pub(crate) fn new(lock: &'a RwLock<ProcessTree>, mode: LockMode) -> Self {
        Self {
            lock,
            mode,
            held: Self::acquire(lock, mode),
        }
    }

    fn acquire(lock: &'a RwLock<ProcessTree>, mode: LockMode) -> Held<'a> {
        match mode {
            LockMode::Unlocked => Held::Nothing,
            LockMode::Shared => Held::Shared(lock.read()),
            LockMode::Exclusive => Held::Exclusive(lock.write()),
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// The tree, unless the guard was taken in [`LockMode::Unlocked`].
    pub fn tree(&self) -> Option<&ProcessTree> {
        match &self.held {
            Held::Shared(guard) => Some(&**guard),
            Held::Exclusive(guard) => Some(&**guard),
            Held::Nothing => None,
        }
    }

    /// The tree, only if the guard was taken in [`LockMode::Exclusive`].
    pub fn tree_mut(&mut self) -> Option<&mut ProcessTree> {
        match &mut self.held {
            Held::Exclusive(guard) => Some(&mut **guard),
            _ => None,
        }
    }

    /// Run `f` with the tree lock released, then reacquire it in the same mode.
    /// Anything read from the tree before the call may be stale afterwards.
    pub fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        self.held = Held::Nothing;
        let ret = f();
        self.held = Self::acquire(self.lock, self.mode);
        ret
    }
}
