//! Data-cache timing scenarios driven through mocked filter caches.

use ooo_core::Config;
use ooo_core::bbl::UopKind;
use ooo_core::core::{CacheModel, Core, L1D_LAT};
use ooo_core::sim::SimGlobals;

use crate::common::builders::{block, general, uop};
use crate::common::mocks::MockL1Filter;

fn setup(l1d: MockL1Filter) -> (CacheModel, SimGlobals) {
    let globals = SimGlobals::new(&Config::default());
    let core = CacheModel::new(Box::new(l1d), "cache-0".into(), globals.phase_length);
    (core, globals)
}

#[test]
fn test_cold_load_miss_commits_at_miss_resolution_plus_l1_latency() {
    let mut l1d = MockL1Filter::new();
    l1d.expect_load()
        .withf(|addr, _| *addr == 0x1000)
        .times(1)
        .returning(|_, _| 100);
    let (mut core, mut globals) = setup(l1d);

    let a = block(0x400000, vec![uop(UopKind::Load, 0, 0, [0, 0], [1, 0])]);
    let b = block(0x400100, vec![general(0, 1)]);

    core.bbl(a.bbl.addr, &a, &mut globals);
    core.load(0x1000);
    globals.counters.total_pcount += 1;
    core.bbl(b.bbl.addr, &b, &mut globals);

    // the miss resolved at cycle 100; the load commits one L1 access later
    assert_eq!(core.reg_ready_cycle(1), 100 + L1D_LAT);
    let access = core.event_recorder().accesses()[0];
    assert_eq!(access.resp_cycle, 100 + L1D_LAT);
    assert!(core.cur_cycle() >= access.req_cycle);
}

#[test]
fn test_fence_orders_load_behind_store_commit() {
    let mut l1d = MockL1Filter::new();
    l1d.expect_store().times(1).returning(|_, req| req + 50);
    l1d.expect_load().times(1).returning(|_, req| req);
    let (mut core, mut globals) = setup(l1d);

    let a = block(
        0x400000,
        vec![
            uop(UopKind::Store, 0, 0, [0, 0], [0, 0]),
            uop(UopKind::Fence, 1, 1, [0, 0], [0, 0]),
            uop(UopKind::Load, 2, 0, [0, 0], [1, 0]),
        ],
    );
    let b = block(0x400100, vec![general(0, 1)]);

    core.bbl(a.bbl.addr, &a, &mut globals);
    core.store(0x40);
    core.load(0x80);
    globals.counters.total_pcount += 3;
    core.bbl(b.bbl.addr, &b, &mut globals);

    let accesses = core.event_recorder().accesses();
    let store_commit = accesses[0].resp_cycle;
    let (store_addr_horizon, _) = core.store_order_cycles();
    assert!(store_addr_horizon >= store_commit);
    // the load dispatched strictly after the fence horizon
    assert_eq!(accesses[1].req_cycle, store_addr_horizon + 1);
    assert_eq!(core.reg_ready_cycle(1), accesses[1].req_cycle + L1D_LAT);
}

#[test]
fn test_predicated_false_ops_skip_the_cache() {
    let mut l1d = MockL1Filter::new();
    // a false predicate must never reach the filter on the load side
    l1d.expect_load().never();
    let (mut core, mut globals) = setup(l1d);

    let a = block(0x400000, vec![uop(UopKind::Load, 0, 0, [0, 0], [1, 0])]);
    let b = block(0x400100, vec![general(0, 1)]);

    core.bbl(a.bbl.addr, &a, &mut globals);
    core.pred_load(0x7000, false);
    globals.counters.total_pcount += 1;
    core.bbl(b.bbl.addr, &b, &mut globals);

    assert_eq!(core.reg_ready_cycle(1), 10);
}

#[test]
fn test_cycle_counters_are_monotone_over_a_mixed_stream() {
    let mut l1d = MockL1Filter::new();
    l1d.expect_load().returning(|_, req| req + 30);
    l1d.expect_store().returning(|_, req| req + 10);
    let (mut core, mut globals) = setup(l1d);

    let load_block = block(0x400000, vec![uop(UopKind::Load, 0, 0, [0, 0], [1, 0])]);
    let store_block = block(
        0x400100,
        vec![
            uop(UopKind::StoreAddr, 0, 1, [0, 0], [0, 0]),
            uop(UopKind::Store, 1, 0, [1, 0], [0, 0]),
        ],
    );

    let mut pcount = 0u64;
    let mut pending = 0u64;
    let mut last_cycle = 0;
    for i in 0..40u64 {
        let (info, is_load) = if i % 2 == 0 {
            (&load_block, true)
        } else {
            (&store_block, false)
        };
        pcount += pending;
        pending = u64::from(info.instrs);
        globals.counters.total_pcount = pcount;
        core.bbl(info.bbl.addr, info, &mut globals);
        if is_load {
            core.load(0x8000 + i * 8);
        } else {
            core.store(0x8000 + i * 8);
        }

        assert!(core.cur_cycle() >= last_cycle);
        assert!(core.decode_cycle() >= 1);
        last_cycle = core.cur_cycle();
    }
    assert_eq!(core.instrs(), pcount);
}
