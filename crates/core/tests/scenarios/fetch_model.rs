//! Frontend and branch-prediction scenarios driven through the context.

use ooo_core::bbl::UopKind;
use ooo_core::config::CoreModelKind;
use ooo_core::core::{Core, CoreModel, DECODE_STAGE, FETCH_STAGE};
use ooo_core::sim::TraceRecord;
use ooo_core::{Config, SimContext};

use crate::common::builders::uop;

fn fetch_context() -> SimContext {
    let mut config = Config::default();
    config.general.model = CoreModelKind::Fetch;
    let mut ctx = SimContext::new(&config);
    ctx.join(0);
    ctx
}

fn define(ctx: &mut SimContext, addr: u64, lat: u32, rd: u16) {
    ctx.define_bbl(addr, 1, 4, vec![uop(UopKind::General, 0, lat, [0, 0], [rd, 0])]);
}

fn bbl(tid: usize, addr: u64) -> TraceRecord {
    TraceRecord::Bbl {
        tid,
        addr,
        instrs: 1,
    }
}

fn branch(pc: u64, taken: bool, taken_npc: u64, not_taken_npc: u64) -> TraceRecord {
    TraceRecord::Branch {
        tid: 0,
        pc,
        taken,
        taken_npc,
        not_taken_npc,
    }
}

#[test]
fn test_primed_predictor_charges_one_misprediction() {
    let mut ctx = fetch_context();
    define(&mut ctx, 0x1000, 1, 0);
    define(&mut ctx, 0x2000, 30, 7);
    define(&mut ctx, 0x3000, 1, 0);

    // prime: the branch at 0x9000 falls through eight times
    for _ in 0..8 {
        ctx.dispatch(&branch(0x9000, false, 0x5000, 0x1000));
        ctx.dispatch(&bbl(0, 0x1000));
    }
    let report = ctx.report();
    assert_eq!(report.cores[0].counters.mispred_branches, 0);

    // the block whose trailing uop resolves the branch late
    ctx.dispatch(&bbl(0, 0x2000));
    // the same branch is suddenly taken
    ctx.dispatch(&branch(0x9000, true, 0x3000, 0x2004));
    ctx.dispatch(&bbl(0, 0x3000));

    let report = ctx.report();
    assert_eq!(report.cores[0].counters.mispred_branches, 1);

    // the frontend restarted at the resolving uop's commit
    let core = ctx.core(0);
    let resolve_commit = core.reg_ready_cycle(7);
    assert!(core.decode_cycle() >= resolve_commit + (DECODE_STAGE - FETCH_STAGE));
}

#[test]
fn test_correctly_predicted_branches_cost_nothing_extra() {
    let mut ctx = fetch_context();
    define(&mut ctx, 0x1000, 1, 0);

    for _ in 0..12 {
        ctx.dispatch(&branch(0x9000, false, 0x5000, 0x1000));
        ctx.dispatch(&bbl(0, 0x1000));
    }
    let with_branches = ctx.report();
    assert_eq!(with_branches.cores[0].counters.mispred_branches, 0);
    // every stall came from instruction fetch, not branch recovery
    assert!(ctx.core(0).decode_cycle() >= FETCH_STAGE);
}

#[test]
fn test_fetch_stalls_accumulate_on_cold_instruction_cache() {
    let mut ctx = fetch_context();
    // sixteen distinct blocks touch sixteen cold lines
    for i in 0..16u64 {
        define(&mut ctx, 0x1000 + i * 0x40, 1, 0);
    }
    for i in 0..16u64 {
        ctx.dispatch(&bbl(0, 0x1000 + i * 0x40));
    }

    let report = ctx.report();
    assert!(report.cores[0].counters.fetch_stalls > 0);
    assert_eq!(report.cores[0].counters.issue_stalls, 0);
}

#[test]
fn test_memory_events_are_ignored() {
    let mut ctx = fetch_context();
    define(&mut ctx, 0x1000, 1, 0);

    // the fetch model has no LSU; stray memory events must be harmless
    ctx.dispatch(&TraceRecord::Load {
        tid: 0,
        addr: 0x8000,
    });
    ctx.dispatch(&bbl(0, 0x1000));
    ctx.dispatch(&TraceRecord::Store {
        tid: 0,
        addr: 0x8000,
    });
    ctx.dispatch(&bbl(0, 0x1000));

    assert_eq!(ctx.core(0).instrs(), 1);
}

#[test]
fn test_wrong_path_fetch_pollutes_the_filter() {
    let mut ctx = fetch_context();
    define(&mut ctx, 0x2000, 60, 7);
    define(&mut ctx, 0x3000, 1, 0);

    ctx.dispatch(&bbl(0, 0x2000));
    let accesses_before = ctx.core(0).event_recorder().accesses().len();
    // mispredicted: the not-taken path at 0x2004 gets fetched
    ctx.dispatch(&branch(0x9000, true, 0x3000, 0x2004));
    ctx.dispatch(&bbl(0, 0x3000));

    let accesses_after = ctx.core(0).event_recorder().accesses().len();
    // wrong-path lines plus the fetch of the new block
    assert!(accesses_after - accesses_before > 1);

    match ctx.core(0) {
        CoreModel::Fetch(model) => assert_eq!(model.mispred_branches(), 1),
        _ => unreachable!("fetch context builds fetch cores"),
    }
}
