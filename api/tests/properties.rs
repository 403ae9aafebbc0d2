mod common;

use common::{INIT, World};
use procctl::imp::procctl::{PPROT_DESCEND, PPROT_SET, ProcctlArg, ReaperPids};
use proctree::{Pid, ProcFlags};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    /// Fork a child of the n-th live process.
    Fork(usize),
    /// Exit and release the n-th live process.
    Exit(usize),
    Acquire(usize),
    Release(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<usize>().prop_map(Op::Fork),
        1 => any::<usize>().prop_map(Op::Exit),
        2 => any::<usize>().prop_map(Op::Acquire),
        1 => any::<usize>().prop_map(Op::Release),
    ]
}

fn pick(live: &[Pid], n: usize) -> Pid {
    live[n % live.len()]
}

/// Replay `ops`, returning the pids still alive.
fn replay(world: &World, ops: &[Op]) -> Vec<Pid> {
    let mut live = vec![INIT];
    for op in ops {
        match *op {
            Op::Fork(n) => live.push(world.fork(pick(&live, n))),
            Op::Exit(n) => {
                let pid = pick(&live, n);
                if pid != INIT {
                    world.table.exit(pid, 0).unwrap();
                    world.table.release(pid).unwrap();
                    live.retain(|&p| p != pid);
                }
            }
            Op::Acquire(n) => {
                let _ = world.acquire(pick(&live, n));
            }
            Op::Release(n) => {
                let _ = world.release(pick(&live, n));
            }
        }
    }
    live
}

proptest! {
    #[test]
    fn hierarchy_stays_consistent(ops in prop::collection::vec(op(), 1..64)) {
        let world = World::new();
        replay(&world, &ops);
        prop_assert!(world.is_consistent());
        let tree = world.table.tree();
        prop_assert_eq!(tree.len(), world.table.get_all_processes().len());
    }

    #[test]
    fn getpids_is_bounded_by_capacity(
        ops in prop::collection::vec(op(), 1..64),
        target in any::<usize>(),
        count in 0u32..16,
    ) {
        let world = World::new();
        let live = replay(&world, &ops);
        let target = pick(&live, target);
        let request = ProcctlArg::ReapGetPids(ReaperPids::new(count));
        let (result, arg) = world.ctl(target, target, request);
        prop_assert!(result.is_ok());
        let ProcctlArg::ReapGetPids(rp) = arg else { unreachable!() };

        let tree = world.table.tree();
        let reaper = tree.effective_reaper(target).unwrap();
        let members = tree.reap_list(reaper).count();
        prop_assert_eq!(rp.pids.len(), members.min(count as usize));
        for info in &rp.pids {
            prop_assert_eq!(tree.reaper(info.pid), Some(reaper));
            prop_assert_eq!(tree.reap_subtree(info.pid), Some(info.subtree));
        }
    }

    #[test]
    fn descend_protects_exactly_the_subtree(
        ops in prop::collection::vec(op(), 1..64),
        target in any::<usize>(),
    ) {
        let world = World::new();
        let live = replay(&world, &ops);
        let target = pick(&live, target);
        world
            .ctl(INIT, target, ProcctlArg::SetProtection(PPROT_SET | PPROT_DESCEND))
            .0
            .unwrap();

        let tree = world.table.tree();
        for &pid in &live {
            let protected = world.process(pid).flags().contains(ProcFlags::PROTECTED);
            let inside = pid == target || tree.is_descendant(pid, target);
            prop_assert_eq!(protected, inside, "pid {}", pid);
        }
    }
}
