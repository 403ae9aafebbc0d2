//! Process control (`procctl`) for the process hierarchy kept by [`proctree`]:
//! reaper acquisition and release, reaper subtree status and pid snapshots,
//! signal broadcast into a reaper's subtree, protection propagation, and
//! trace-visibility control.
//!
//! `imp` holds the typed operations and the dispatcher, `interface` the raw syscall
//! entry point.
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod error;
pub mod imp;
pub mod interface;
pub mod policy;

pub use error::{ProcctlError, ProcctlResult};
pub use policy::{AccessPolicy, Caller, Privilege, SignalInfo, SignalSink};
