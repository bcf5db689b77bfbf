//! Per-process simulation context.
//!
//! Bundles the state the original tool kept process-global: the sparse
//! thread → core dispatch table, the phase clock, the instruction
//! counters, the decode cache, and the barrier. The context is also the
//! front-end: it routes trace events to the owning core with the same
//! deferred accounting the instrumentation callbacks perform, and runs the
//! end-of-block barrier loop.

use std::sync::Arc;

use crate::bbl::{BasicBlockKey, BblInfo, BblMap, DynBbl, DynUop};
use crate::common::{Address, Cycle, ThreadId};
use crate::config::Config;
use crate::core::{Core, CoreModel};
use crate::sim::barrier::{Barrier, FixedBarrier};
use crate::sim::trace::TraceRecord;
use crate::stats::{
    CoreReport, GlobalCounters, NullBackend, PeriodicBackend, SimReport,
};

/// Process-wide simulation parameters and counters, passed explicitly to
/// every core callback.
pub struct SimGlobals {
    /// Cycles per barrier phase.
    pub phase_length: u64,
    /// log2 of the cache line size.
    pub line_bits: u32,
    /// Instructions between periodic stats dumps.
    pub interval_size: u64,
    /// Cycles completed by the global phase clock.
    pub glob_phase_cycles: Cycle,
    /// Instruction accounting maintained by the dispatch layer.
    pub counters: GlobalCounters,
    /// Sink for periodic dumps.
    pub periodic: Box<dyn PeriodicBackend>,
}

impl SimGlobals {
    /// Creates globals from a configuration; periodic dumps are discarded
    /// until a backend is installed.
    pub fn new(config: &Config) -> Self {
        Self {
            phase_length: config.general.phase_length,
            line_bits: config.general.line_bits,
            interval_size: config.general.interval_size,
            glob_phase_cycles: 0,
            counters: GlobalCounters::default(),
            periodic: Box::new(NullBackend),
        }
    }

    /// Flushes the periodic backend once enough instructions accumulated.
    pub fn flush_periodic_if_due(&mut self) {
        if self.counters.interval_icount >= self.interval_size {
            self.periodic.dump(false, &self.counters);
            self.counters.interval_icount = 0;
            self.counters.interval_pcount = 0;
        }
    }
}

/// Per-process simulation state; owns the thread → core table.
pub struct SimContext {
    /// Sparse thread → core dispatch table.
    cores: Vec<Option<CoreModel>>,
    /// Hardware context owned by each thread.
    cids: Vec<u32>,
    /// Deferred-block instruction counts, one latch per thread. The
    /// deferred block is committed to `total_pcount` when its successor
    /// arrives, mirroring the one-block simulation lag in the cores.
    pending_instrs: Vec<u64>,
    bbl_map: BblMap,
    barrier: Box<dyn Barrier>,
    /// Shared parameters and counters handed to core callbacks.
    pub globals: SimGlobals,
}

impl SimContext {
    /// Builds a context with one core per configured thread.
    pub fn new(config: &Config) -> Self {
        config.validate();
        let num_cores = config.general.num_cores;
        let cores = (0..num_cores)
            .map(|i| Some(CoreModel::build(config, format!("core-{i}"))))
            .collect();
        Self {
            cores,
            cids: (0..num_cores as u32).collect(),
            pending_instrs: vec![0; num_cores],
            bbl_map: BblMap::new(),
            barrier: Box::new(FixedBarrier),
            globals: SimGlobals::new(config),
        }
    }

    /// The core bound to `tid`.
    ///
    /// # Panics
    ///
    /// Panics if no core is bound to the thread.
    pub fn core(&self, tid: ThreadId) -> &CoreModel {
        self.cores[tid].as_ref().expect("no core bound to thread")
    }

    /// The hardware context currently owned by `tid`.
    pub fn cid(&self, tid: ThreadId) -> u32 {
        self.cids[tid]
    }

    /// Installs a periodic-dump backend.
    pub fn set_periodic_backend(&mut self, backend: Box<dyn PeriodicBackend>) {
        self.globals.periodic = backend;
    }

    /// Installs a barrier implementation.
    pub fn set_barrier(&mut self, barrier: Box<dyn Barrier>) {
        self.barrier = barrier;
    }

    /// Registers a decoded basic block in the decode cache.
    pub fn define_bbl(&mut self, addr: Address, instrs: u32, bytes: u32, uops: Vec<DynUop>) {
        let info = Arc::new(BblInfo {
            instrs,
            bytes,
            bbl: DynBbl { addr, uops },
        });
        self.bbl_map
            .insert(BasicBlockKey::new(addr, u64::from(instrs)), info);
    }

    /// The thread gained a hardware context.
    pub fn join(&mut self, tid: ThreadId) {
        let core = self.cores[tid].as_mut().expect("no core bound to thread");
        core.join(&self.globals);
    }

    /// The thread lost its hardware context.
    pub fn leave(&mut self, tid: ThreadId) {
        let core = self.cores[tid].as_mut().expect("no core bound to thread");
        core.leave();
    }

    /// Scheduler-driven cancellation of the thread's deferred block.
    pub fn context_switch(&mut self, tid: ThreadId, gid: i64) {
        if gid == -1 {
            self.pending_instrs[tid] = 0;
        }
        let core = self.cores[tid].as_mut().expect("no core bound to thread");
        core.context_switch(gid);
    }

    /// Opens a contention-simulation epoch on every bound core.
    pub fn c_sim_start(&mut self) {
        for core in self.cores.iter_mut().flatten() {
            core.c_sim_start();
        }
    }

    /// Closes the contention-simulation epoch on every bound core.
    pub fn c_sim_end(&mut self) {
        for core in self.cores.iter_mut().flatten() {
            core.c_sim_end();
        }
    }

    /// Routes one trace record to its core.
    pub fn dispatch(&mut self, record: &TraceRecord) {
        match *record {
            TraceRecord::DefineBbl {
                addr,
                instrs,
                bytes,
                ref uops,
            } => self.define_bbl(addr, instrs, bytes, uops.clone()),

            TraceRecord::Load { tid, addr } => {
                self.cores[tid]
                    .as_mut()
                    .expect("no core bound to thread")
                    .load(addr);
            }
            TraceRecord::Store { tid, addr } => {
                self.cores[tid]
                    .as_mut()
                    .expect("no core bound to thread")
                    .store(addr);
            }
            TraceRecord::PredLoad { tid, addr, pred } => {
                self.cores[tid]
                    .as_mut()
                    .expect("no core bound to thread")
                    .pred_load(addr, pred);
            }
            TraceRecord::PredStore { tid, addr, pred } => {
                self.cores[tid]
                    .as_mut()
                    .expect("no core bound to thread")
                    .pred_store(addr, pred);
            }
            TraceRecord::Branch {
                tid,
                pc,
                taken,
                taken_npc,
                not_taken_npc,
            } => {
                self.cores[tid]
                    .as_mut()
                    .expect("no core bound to thread")
                    .branch(pc, taken, taken_npc, not_taken_npc);
            }

            TraceRecord::Bbl { tid, addr, instrs } => self.bbl_boundary(tid, addr, instrs),
        }
    }

    /// Streams a whole trace through the context.
    pub fn run(&mut self, records: &[TraceRecord]) {
        for record in records {
            self.dispatch(record);
        }
    }

    /// Handles a block boundary: commits the deferred accounting, hands
    /// the event to the core, and yields at phase ends.
    fn bbl_boundary(&mut self, tid: ThreadId, addr: Address, instrs: u32) {
        let key = BasicBlockKey::new(addr, u64::from(instrs));
        let info = self
            .bbl_map
            .get(&key)
            .unwrap_or_else(|| panic!("basic block {addr:#x} ({instrs} instrs) was never defined"))
            .clone();

        // The block handed over now is simulated one boundary later, so
        // its instructions enter pcount when its successor arrives.
        let pending = std::mem::replace(&mut self.pending_instrs[tid], u64::from(info.instrs));
        self.globals.counters.total_pcount += pending;
        self.globals.counters.interval_pcount += pending;
        self.globals.counters.total_icount += u64::from(info.instrs);
        self.globals.counters.interval_icount += u64::from(info.instrs);

        let core = self.cores[tid].as_mut().expect("no core bound to thread");
        core.bbl(addr, &info, &mut self.globals);

        while core.cur_cycle() > core.phase_end_cycle() {
            core.push_phase_end(self.globals.phase_length);

            /* The barrier may migrate this thread to another context; if
             * it does, the only safe move is to stop touching this core
             * and return to the front-end immediately. */
            let cid = self.cids[tid];
            let new_cid = self.barrier.take_barrier(tid, cid);
            self.globals.glob_phase_cycles += self.globals.phase_length;
            if new_cid != cid {
                self.cids[tid] = new_cid;
                break;
            }
        }
    }

    /// Snapshot of the published statistics.
    pub fn report(&self) -> SimReport {
        SimReport {
            counters: self.globals.counters,
            cores: self
                .cores
                .iter()
                .flatten()
                .map(|core| CoreReport {
                    name: core.name().to_string(),
                    cycles: core.cycles(),
                    c_cycles: core.contention_cycles(),
                    instrs: core.instrs(),
                    counters: core.counters(),
                })
                .collect(),
        }
    }
}
