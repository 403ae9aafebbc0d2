mod common;

use axerrno::LinuxError;
use common::{INIT, World};
use procctl::ProcctlError;
use procctl::imp::procctl::{
    PROC_TRACE_CTL_DISABLE, PROC_TRACE_CTL_DISABLE_EXEC, PROC_TRACE_CTL_ENABLE, ProcctlArg,
    TraceStatus,
};
use proctree::{Pid, ProcFlags};

fn trace_ctl(world: &World, caller: Pid, target: Pid, state: i32) -> Result<(), ProcctlError> {
    world.ctl(caller, target, ProcctlArg::TraceCtl(state)).0
}

fn trace_status(world: &World, target: Pid) -> TraceStatus {
    match world.ctl(target, target, ProcctlArg::TraceStatus(TraceStatus::default())) {
        (Ok(()), ProcctlArg::TraceStatus(status)) => status,
        (result, _) => panic!("trace status failed: {result:?}"),
    }
}

#[test]
fn status_reports_tracer() {
    let world = World::new();
    let debugger = world.fork(INIT);
    let p = world.fork(INIT);
    assert_eq!(trace_status(&world, p), TraceStatus::NotTraced);
    world.process(p).attach_tracer(debugger).unwrap();
    assert_eq!(trace_status(&world, p), TraceStatus::TracedBy(debugger));
    assert_eq!(trace_status(&world, p).as_raw(), debugger as i64);
    world.process(p).detach_tracer();
    assert_eq!(trace_status(&world, p).as_raw(), 0);
}

#[test]
fn busy_while_traced() {
    let world = World::new();
    let debugger = world.fork(INIT);
    let p = world.fork(INIT);
    world.process(p).attach_tracer(debugger).unwrap();
    for state in [PROC_TRACE_CTL_ENABLE, PROC_TRACE_CTL_DISABLE, PROC_TRACE_CTL_DISABLE_EXEC] {
        assert_eq!(trace_ctl(&world, p, p, state), Err(ProcctlError::Busy));
    }

    let q = world.fork(INIT);
    world.process(q).set_ktrace(true);
    assert_eq!(trace_ctl(&world, q, q, PROC_TRACE_CTL_DISABLE), Err(ProcctlError::Busy));
    world.process(q).set_ktrace(false);
    trace_ctl(&world, q, q, PROC_TRACE_CTL_DISABLE).unwrap();
}

#[test]
fn disable_refuses_attach() {
    let world = World::new();
    let debugger = world.fork(INIT);
    let p = world.fork(INIT);
    trace_ctl(&world, INIT, p, PROC_TRACE_CTL_DISABLE).unwrap();
    assert_eq!(trace_status(&world, p), TraceStatus::Untraceable);
    assert_eq!(trace_status(&world, p).as_raw(), -1);
    assert_eq!(world.process(p).attach_tracer(debugger), Err(LinuxError::EPERM));

    // already disabled is not busy
    trace_ctl(&world, INIT, p, PROC_TRACE_CTL_DISABLE).unwrap();
}

#[test]
fn only_self_can_enable() {
    let world = World::new();
    let p = world.fork(INIT);
    trace_ctl(&world, INIT, p, PROC_TRACE_CTL_DISABLE).unwrap();
    assert_eq!(
        trace_ctl(&world, INIT, p, PROC_TRACE_CTL_ENABLE),
        Err(ProcctlError::PermissionDenied)
    );
    assert_eq!(trace_status(&world, p), TraceStatus::Untraceable);
    trace_ctl(&world, p, p, PROC_TRACE_CTL_ENABLE).unwrap();
    assert_eq!(trace_status(&world, p), TraceStatus::NotTraced);
    assert!(!world
        .process(p)
        .flags()
        .intersects(ProcFlags::NOTRACE | ProcFlags::NOTRACE_EXEC));
}

#[test]
fn disable_exec_expires_on_exec() {
    let world = World::new();
    let debugger = world.fork(INIT);
    let p = world.fork(INIT);
    trace_ctl(&world, INIT, p, PROC_TRACE_CTL_DISABLE_EXEC).unwrap();
    assert_eq!(trace_status(&world, p), TraceStatus::Untraceable);
    world.process(p).exec();
    assert_eq!(trace_status(&world, p), TraceStatus::NotTraced);
    world.process(p).attach_tracer(debugger).unwrap();
}

#[test]
fn disable_makes_disable_exec_permanent() {
    let world = World::new();
    let p = world.fork(INIT);
    trace_ctl(&world, p, p, PROC_TRACE_CTL_DISABLE_EXEC).unwrap();
    // another process cannot drop the exec expiry
    assert_eq!(
        trace_ctl(&world, INIT, p, PROC_TRACE_CTL_DISABLE),
        Err(ProcctlError::PermissionDenied)
    );
    trace_ctl(&world, p, p, PROC_TRACE_CTL_DISABLE).unwrap();
    assert_eq!(world.process(p).flags() & ProcFlags::NOTRACE_EXEC, ProcFlags::empty());
    world.process(p).exec();
    assert_eq!(trace_status(&world, p), TraceStatus::Untraceable);
}

#[test]
fn dangling_exec_flag_is_inconsistent() {
    let world = World::new();
    let p = world.fork(INIT);
    trace_ctl(&world, p, p, PROC_TRACE_CTL_DISABLE_EXEC).unwrap();
    world.process(p).lock().flags.remove(ProcFlags::NOTRACE);
    assert_eq!(
        trace_ctl(&world, p, p, PROC_TRACE_CTL_DISABLE),
        Err(ProcctlError::InternalInconsistency)
    );
}

#[test]
fn unknown_state() {
    let world = World::new();
    let p = world.fork(INIT);
    for state in [0, 4, -1] {
        assert_eq!(trace_ctl(&world, p, p, state), Err(ProcctlError::InvalidArgument));
    }
    assert_eq!(trace_status(&world, p), TraceStatus::NotTraced);
}

#[test]
fn group_disable() {
    let world = World::new();
    let leader = world.fork(INIT);
    world.table.create_group(leader).unwrap();
    let member = world.fork(leader);
    assert_eq!(world.process(member).get_pgid(), leader);
    let outsider = world.fork(INIT);

    let (result, _) = world.ctl_group(INIT, leader, ProcctlArg::TraceCtl(PROC_TRACE_CTL_DISABLE));
    result.unwrap();
    assert_eq!(trace_status(&world, leader), TraceStatus::Untraceable);
    assert_eq!(trace_status(&world, member), TraceStatus::Untraceable);
    assert_eq!(trace_status(&world, outsider), TraceStatus::NotTraced);
}

#[test]
fn traced_children_inherit_notrace() {
    let world = World::new();
    let p = world.fork(INIT);
    trace_ctl(&world, p, p, PROC_TRACE_CTL_DISABLE).unwrap();
    let child = world.fork(p);
    assert_eq!(trace_status(&world, child), TraceStatus::Untraceable);
}

#[test]
fn exited_debugger_leaves_tracee_untraced() {
    let world = World::new();
    let debugger = world.fork(INIT);
    let p = world.fork(INIT);
    world.process(p).attach_tracer(debugger).unwrap();
    world.table.exit(debugger, 0).unwrap();
    world.table.release(debugger).unwrap();

    assert_eq!(trace_status(&world, p), TraceStatus::NotTraced);
    trace_ctl(&world, p, p, PROC_TRACE_CTL_DISABLE).unwrap();
    assert_eq!(trace_status(&world, p), TraceStatus::Untraceable);
}
