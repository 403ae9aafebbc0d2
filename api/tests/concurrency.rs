mod common;

use common::{INIT, World};
use procctl::imp::procctl::{
    PPROT_CLEAR, PPROT_DESCEND, PPROT_SET, PROC_TRACE_CTL_DISABLE, PROC_TRACE_CTL_ENABLE,
    ProcctlArg, ReaperPids, ReaperStatus, TraceStatus,
};
use std::thread;

const ROUNDS: usize = 200;

#[test]
fn getpids_races_fork_and_exit() {
    let world = World::new();
    let r = world.fork(INIT);
    world.acquire(r).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..ROUNDS {
                let child = world.fork(r);
                let grandchild = world.fork(child);
                world.table.exit(child, 0).unwrap();
                world.table.release(child).unwrap();
                world.table.exit(grandchild, 0).unwrap();
                world.table.release(grandchild).unwrap();
            }
        });
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let (result, arg) =
                        world.ctl(r, r, ProcctlArg::ReapGetPids(ReaperPids::new(8)));
                    assert_eq!(result, Ok(()));
                    let ProcctlArg::ReapGetPids(rp) = arg else {
                        unreachable!()
                    };
                    assert!(rp.pids.len() <= 8);
                    assert!(rp.pids.iter().all(|info| info.pid != r));

                    let (result, _) =
                        world.ctl(r, r, ProcctlArg::ReapStatus(ReaperStatus::default()));
                    assert_eq!(result, Ok(()));
                }
            });
        }
    });

    assert!(world.is_consistent());
    assert_eq!(world.table.tree().reap_list(r).count(), 0);
}

#[test]
fn acquire_release_and_protect_interleave() {
    let world = World::new();
    let reapers: Vec<_> = (0..4).map(|_| world.fork(INIT)).collect();
    for &r in &reapers {
        for _ in 0..4 {
            world.fork(r);
        }
    }

    thread::scope(|s| {
        for &r in &reapers {
            let world = &world;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    world.acquire(r).unwrap();
                    let leaf = world.fork(r);
                    world.release(r).unwrap();
                    world.table.exit(leaf, 0).unwrap();
                    world.table.release(leaf).unwrap();
                }
            });
        }
        s.spawn(|| {
            for i in 0..ROUNDS {
                let op = if i % 2 == 0 { PPROT_SET } else { PPROT_CLEAR };
                let target = reapers[i % reapers.len()];
                world
                    .ctl(INIT, target, ProcctlArg::SetProtection(op | PPROT_DESCEND))
                    .0
                    .unwrap();
            }
        });
        s.spawn(|| {
            let target = reapers[0];
            for i in 0..ROUNDS {
                let state = if i % 2 == 0 {
                    PROC_TRACE_CTL_DISABLE
                } else {
                    PROC_TRACE_CTL_ENABLE
                };
                world.ctl(target, target, ProcctlArg::TraceCtl(state)).0.unwrap();
                let (result, _) =
                    world.ctl(target, target, ProcctlArg::TraceStatus(TraceStatus::default()));
                assert_eq!(result, Ok(()));
            }
        });
    });

    assert!(world.is_consistent());
    let tree = world.table.tree();
    for &r in &reapers {
        assert!(!tree.is_reaper(r));
        assert_eq!(tree.children(r).count(), 4);
    }
}
