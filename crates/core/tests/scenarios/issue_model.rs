//! Backend structural-hazard scenarios driven through the context.

use ooo_core::bbl::UopKind;
use ooo_core::config::CoreModelKind;
use ooo_core::core::{Core, CoreModel, IssueModel, L1D_LAT};
use ooo_core::sim::TraceRecord;
use ooo_core::{Config, SimContext};

use crate::common::builders::uop;

fn issue_context(tweak: impl FnOnce(&mut Config)) -> SimContext {
    let mut config = Config::default();
    config.general.model = CoreModelKind::Issue;
    tweak(&mut config);
    let mut ctx = SimContext::new(&config);
    ctx.join(0);
    ctx
}

fn issue_core(ctx: &SimContext) -> &IssueModel {
    match ctx.core(0) {
        CoreModel::Issue(model) => model,
        _ => unreachable!("issue context builds issue cores"),
    }
}

fn bbl(addr: u64, instrs: u32) -> TraceRecord {
    TraceRecord::Bbl {
        tid: 0,
        addr,
        instrs,
    }
}

#[test]
fn test_store_forward_bounds_the_dependent_load() {
    let mut ctx = issue_context(|_| {});
    ctx.define_bbl(
        0x1000,
        2,
        8,
        vec![
            uop(UopKind::Store, 0, 0, [0, 0], [0, 0]),
            uop(UopKind::Load, 2, 0, [0, 0], [5, 0]),
        ],
    );
    ctx.define_bbl(0x2000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [0, 0])]);

    ctx.dispatch(&bbl(0x1000, 2));
    ctx.dispatch(&TraceRecord::Store {
        tid: 0,
        addr: 0x200,
    });
    ctx.dispatch(&TraceRecord::Load {
        tid: 0,
        addr: 0x200,
    });
    ctx.dispatch(&bbl(0x2000, 1));

    let core = issue_core(&ctx);
    let store_cycle = core.forward_cycle(0x200).expect("forwarding entry");
    let load_commit = core.reg_ready_cycle(5);
    // the load commits at the later of its own L1 access and the store
    assert!(load_commit >= store_cycle);
    assert!(load_commit >= 6 + L1D_LAT);
}

#[test]
fn test_unrelated_load_does_not_forward() {
    let mut ctx = issue_context(|_| {});
    ctx.define_bbl(
        0x1000,
        2,
        8,
        vec![
            uop(UopKind::Store, 0, 0, [0, 0], [0, 0]),
            uop(UopKind::Load, 2, 0, [0, 0], [5, 0]),
        ],
    );
    ctx.define_bbl(0x2000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [0, 0])]);

    ctx.dispatch(&bbl(0x1000, 2));
    ctx.dispatch(&TraceRecord::Store {
        tid: 0,
        addr: 0x200,
    });
    // different word, same forwarding slot family is irrelevant here
    ctx.dispatch(&TraceRecord::Load {
        tid: 0,
        addr: 0x300,
    });
    ctx.dispatch(&bbl(0x2000, 1));

    let core = issue_core(&ctx);
    assert!(core.forward_cycle(0x200).is_some());
    assert!(core.forward_cycle(0x300).is_none());
}

#[test]
fn test_issue_width_stalls_are_counted() {
    let mut ctx = issue_context(|config| config.core.width = 2);
    ctx.define_bbl(
        0x1000,
        6,
        24,
        (0..6)
            .map(|_| uop(UopKind::General, 0, 1, [0, 0], [0, 0]))
            .collect(),
    );
    ctx.define_bbl(0x2000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [0, 0])]);

    ctx.dispatch(&bbl(0x1000, 6));
    ctx.dispatch(&bbl(0x2000, 1));

    // six same-cycle uops through a two-wide issue stage
    assert_eq!(ctx.report().cores[0].counters.issue_stalls, 2);
}

#[test]
fn test_rf_port_overflow_advances_the_cycle() {
    let mut ctx = issue_context(|config| config.core.prf_ports = 2);
    ctx.define_bbl(
        0x1000,
        3,
        12,
        vec![
            uop(UopKind::General, 0, 1, [0, 0], [1, 0]),
            uop(UopKind::General, 0, 1, [0, 0], [2, 0]),
            uop(UopKind::General, 0, 1, [0, 0], [3, 0]),
        ],
    );
    ctx.define_bbl(
        0x2000,
        3,
        12,
        vec![
            uop(UopKind::General, 20, 1, [1, 2], [4, 0]),
            uop(UopKind::General, 20, 1, [2, 3], [5, 0]),
            uop(UopKind::General, 20, 1, [1, 3], [6, 0]),
        ],
    );
    ctx.define_bbl(0x3000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [0, 0])]);

    ctx.dispatch(&bbl(0x1000, 3));
    ctx.dispatch(&bbl(0x2000, 3));
    let before = ctx.core(0).cur_cycle();
    ctx.dispatch(&bbl(0x3000, 1));

    // six stale reads against two ports cost two extra issue cycles
    assert_eq!(ctx.core(0).cur_cycle(), before.max(24) + 2);
}

#[test]
fn test_load_commits_at_least_l1_latency_after_dispatch() {
    let mut ctx = issue_context(|_| {});
    ctx.define_bbl(0x1000, 1, 4, vec![uop(UopKind::Load, 0, 0, [0, 0], [5, 0])]);
    ctx.define_bbl(0x2000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [0, 0])]);

    ctx.dispatch(&bbl(0x1000, 1));
    ctx.dispatch(&TraceRecord::Load {
        tid: 0,
        addr: 0x8000,
    });
    ctx.dispatch(&bbl(0x2000, 1));

    // dispatch is at least six cycles past issue, plus the L1 access
    assert!(ctx.core(0).reg_ready_cycle(5) >= 6 + L1D_LAT);
}

#[test]
fn test_queue_capacities_backpressure_long_blocks() {
    let mut ctx = issue_context(|config| {
        config.core.width = 1;
        config.core.ins_win_cap = 8;
        config.core.issue_queue_cap = 2;
        config.core.load_queue_cap = 4;
        config.core.store_queue_cap = 4;
    });
    let uops: Vec<_> = (0..32)
        .map(|_| uop(UopKind::General, 0, 1, [0, 0], [0, 0]))
        .collect();
    ctx.define_bbl(0x1000, 32, 128, uops);
    ctx.define_bbl(0x2000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [0, 0])]);

    ctx.dispatch(&bbl(0x1000, 32));
    ctx.dispatch(&bbl(0x2000, 1));

    let core = ctx.core(0);
    // a single-issue backend pays at least one cycle per uop
    assert!(core.cur_cycle() >= 32);
    assert!(core.decode_cycle() > 5);
    assert!(ctx.report().cores[0].counters.issue_stalls > 0);
}

#[test]
fn test_join_realigns_to_the_global_phase_clock() {
    let mut ctx = issue_context(|_| {});
    ctx.define_bbl(0x1000, 1, 4, vec![uop(UopKind::General, 0, 1, [0, 0], [1, 0])]);
    ctx.dispatch(&bbl(0x1000, 1));
    ctx.dispatch(&bbl(0x1000, 1));

    ctx.leave(0);
    ctx.globals.glob_phase_cycles = 30_000;
    ctx.join(0);

    let core = ctx.core(0);
    assert_eq!(core.cur_cycle(), 30_000);
    assert_eq!(core.phase_end_cycle(), 30_000 + ctx.globals.phase_length);
    assert_eq!(core.phase_cycles(ctx.globals.phase_length), 0);
    // descheduled time is not unhalted time
    assert!(core.cycles() < 100);
}
