//! Process hierarchy bookkeeping for reaper-based supervision.
//! The hierarchy (parent/children links, reaper assignment and reap lists) lives in a single
//! arena, [`ProcessTree`], guarded by one readers-writer lock, the tree lock.
//! Each [`Process`] keeps its own mutable attributes (state, flags, tracer) behind a
//! per-record lock. Lock order: tree lock, then process group table, then record lock.
//! Process has child processes, ProcessGroup contains Process.
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod config;
pub mod flags;
pub mod process;
pub mod process_group;
pub mod table;
pub mod tree;

/// Type alias for process ID and process group ID.
/// Linux uses `int` for these IDs, which is typically 32 bits.
pub type Pid = u32;

pub use config::TableConfig;
pub use flags::ProcFlags;
pub use process::{ProcState, Process, ProcessInner};
pub use process_group::ProcessGroup;
pub use table::ProcTable;
pub use tree::{LockMode, ProcessTree, TreeGuard, TreeNode};
