//! Timing cores.
//!
//! Three separately-configurable engines share one issue-centric skeleton:
//! 1. **[`CacheModel`]**: data-cache timing only; loads and stores are
//!    scheduled against the L1 filter cache.
//! 2. **[`FetchModel`]**: instruction-fetch and branch-prediction timing;
//!    a TAGE predictor gates frontend progress.
//! 3. **[`IssueModel`]**: backend structural hazards, from instruction-window
//!    port scheduling to ROB and LSQ capacity, RF read ports, and issue width.
//!
//! Every model consumes decoded basic blocks one block behind the
//! front-end (the trailing memory addresses of a block are only known once
//! the next block arrives) and advances a per-thread cycle pair: the
//! issue-centric `cur_cycle` and the decode-stage clock `decode_cycle`.

/// Register scoreboard for dataflow scheduling.
pub mod scoreboard;
/// Retire-cycle FIFOs (ROB, load/store queues, uop queue).
pub mod rob;
/// Instruction-window port scheduler.
pub mod window;
/// Contention-recorder glue to the global phase model.
pub mod recorder;

/// Data-cache timing engine.
pub mod cache_model;
/// Frontend and branch-prediction timing engine.
pub mod fetch_model;
/// Backend structural-hazard timing engine.
pub mod issue_model;

use std::sync::Arc;

use crate::bbl::BblInfo;
use crate::common::{Address, Cycle, INVALID_ADDRESS};
use crate::config::{Config, CoreModelKind};
use crate::mem::filter_cache::LineFilterCache;
use crate::sim::SimGlobals;
use crate::stats::CoreCounters;

pub use self::cache_model::CacheModel;
pub use self::fetch_model::FetchModel;
pub use self::issue_model::IssueModel;
pub use self::recorder::CoreRecorder;
pub use self::scoreboard::{MAX_REGISTERS, RegScoreboard};

// Pipeline stages, roughly matched to Westmere. The issue-centric cycle
// counters are anchored at ISSUE_STAGE; other stage times are fixed offsets.
pub const FETCH_STAGE: Cycle = 1;
pub const DECODE_STAGE: Cycle = 4;
pub const ISSUE_STAGE: Cycle = 7;
pub const DISPATCH_STAGE: Cycle = 13;

/// L1 instruction-cache access latency.
pub const L1I_LAT: Cycle = 3;
/// L1 data-cache access latency; the filter cache does not include it.
pub const L1D_LAT: Cycle = 4;

/// Capability set shared by the three timing models.
///
/// The event methods (`load`, `store`, `branch`, ...) default to no-ops;
/// each model overrides exactly the events it times. `bbl` is the hot path
/// and must be called once per basic block in program order.
pub trait Core {
    /// Core name used in diagnostics and reports.
    fn name(&self) -> &str;

    /// Consumes a basic-block boundary: simulates the deferred previous
    /// block and defers `bbl_info`.
    fn bbl(&mut self, bbl_addr: Address, bbl_info: &Arc<BblInfo>, globals: &mut SimGlobals);

    /// Records a load address for the block in flight.
    fn load(&mut self, _addr: Address) {}

    /// Records a store address for the block in flight.
    fn store(&mut self, _addr: Address) {}

    /// Records a predicated load; a false predicate still retires a uop.
    fn pred_load(&mut self, _addr: Address, _pred: bool) {}

    /// Records a predicated store; a false predicate still retires a uop.
    fn pred_store(&mut self, _addr: Address, _pred: bool) {}

    /// Latches the conditional branch terminating the block in flight.
    fn branch(&mut self, _pc: Address, _taken: bool, _taken_npc: Address, _not_taken_npc: Address) {
    }

    /// The owning thread gained a hardware context.
    fn join(&mut self, globals: &SimGlobals);

    /// The owning thread lost its hardware context.
    fn leave(&mut self);

    /// Scheduler-driven cancellation; `gid == -1` drops the deferred block
    /// and invalidates virtually-addressed state.
    fn context_switch(&mut self, gid: i64);

    /// Opens a contention-simulation epoch.
    fn c_sim_start(&mut self);

    /// Closes the contention-simulation epoch.
    fn c_sim_end(&mut self);

    /// The recorder bridging this core to the contention model.
    fn event_recorder(&self) -> &CoreRecorder;

    /// Simulated unhalted cycles.
    fn cycles(&self) -> u64;

    /// Stall cycles attributed to cross-core contention.
    fn contention_cycles(&self) -> u64 {
        self.event_recorder().contention_cycles()
    }

    /// Retired instruction count.
    fn instrs(&self) -> u64;

    /// Cycles into the current phase.
    fn phase_cycles(&self, phase_length: u64) -> u64;

    /// Current issue-centric cycle.
    fn cur_cycle(&self) -> Cycle;

    /// Current decode-stage cycle.
    fn decode_cycle(&self) -> Cycle;

    /// Cycle at which the core must next yield to the barrier.
    fn phase_end_cycle(&self) -> Cycle;

    /// Moves the yield point one phase further out.
    fn push_phase_end(&mut self, phase_length: u64);

    /// Soft-error counters this model maintains.
    fn counters(&self) -> CoreCounters {
        CoreCounters::default()
    }

    /// Earliest cycle at which `reg` can be sourced.
    fn reg_ready_cycle(&self, reg: u16) -> Cycle;
}

/// Per-thread skeleton state shared by all three models.
#[derive(Debug)]
pub(crate) struct CoreState {
    pub name: String,
    /// Issue-centric cycle counter; monotone non-decreasing.
    pub cur_cycle: Cycle,
    /// Decode-stage clock; stays at or above `FETCH_STAGE`.
    pub decode_cycle: Cycle,
    /// Next barrier point.
    pub phase_end_cycle: Cycle,
    /// Deferred block awaiting simulation.
    pub prev_bbl: Option<Arc<BblInfo>>,
    pub scoreboard: RegScoreboard,
    /// Retired instruction count.
    pub instrs: u64,
    pub rec: CoreRecorder,
}

impl CoreState {
    pub fn new(name: String, phase_length: u64) -> Self {
        Self {
            name,
            cur_cycle: 0,
            // start at DECODE_STAGE so the fetch offset can be subtracted
            decode_cycle: DECODE_STAGE,
            phase_end_cycle: phase_length,
            prev_bbl: None,
            scoreboard: RegScoreboard::new(),
            instrs: 0,
            rec: CoreRecorder::new(),
        }
    }

    /// Swaps in the incoming block, returning the deferred one.
    #[inline]
    pub fn defer_bbl(&mut self, incoming: &Arc<BblInfo>) -> Option<Arc<BblInfo>> {
        self.prev_bbl.replace(Arc::clone(incoming))
    }

    /// Advances both cycle counters in lockstep. Only the join and
    /// contention paths may jump the clocks like this.
    pub fn advance(&mut self, target_cycle: Cycle) {
        debug_assert!(target_cycle > self.cur_cycle);
        self.decode_cycle += target_cycle - self.cur_cycle;
        self.cur_cycle = target_cycle;
    }
}

/// Capacity of the per-block memory-op address buffers.
const MEM_OPS_PER_BBL: usize = 256;

/// Fixed buffer of dynamic memory-op addresses for one basic block.
pub(crate) struct MemOpBuffer {
    addrs: [Address; MEM_OPS_PER_BBL],
    len: u32,
}

impl MemOpBuffer {
    pub fn new() -> Self {
        Self {
            addrs: [0; MEM_OPS_PER_BBL],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, addr: Address) {
        self.addrs[self.len as usize] = addr;
        self.len += 1;
    }

    /// Records a predicated-false op; it still retires as a 0-cycle access.
    #[inline]
    pub fn push_pred_false(&mut self) {
        self.push(INVALID_ADDRESS);
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Address {
        self.addrs[idx]
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// LSU ordering state shared by the models that time memory ops.
pub(crate) struct LsuState {
    pub load_addrs: MemOpBuffer,
    pub store_addrs: MemOpBuffer,
    /// Latest commit of any store-data uop.
    pub last_store_commit_cycle: Cycle,
    /// Latest commit of any store-address uop; loads queue behind it.
    pub last_store_addr_commit_cycle: Cycle,
}

impl LsuState {
    pub fn new() -> Self {
        Self {
            load_addrs: MemOpBuffer::new(),
            store_addrs: MemOpBuffer::new(),
            last_store_commit_cycle: 0,
            last_store_addr_commit_cycle: 0,
        }
    }

    #[inline]
    pub fn clear_bufs(&mut self) {
        self.load_addrs.clear();
        self.store_addrs.clear();
    }
}

/// The three timing models behind a statically-dispatched wrapper; avoids
/// vtable lookups on the per-block hot path.
pub enum CoreModel {
    Cache(CacheModel),
    Fetch(FetchModel),
    Issue(IssueModel),
}

impl CoreModel {
    /// Builds the model selected by the configuration.
    pub fn build(config: &Config, name: String) -> Self {
        let phase_length = config.general.phase_length;
        match config.general.model {
            CoreModelKind::Cache => {
                let l1d = Box::new(LineFilterCache::new(&config.cache, config.general.line_bits));
                Self::Cache(CacheModel::new(l1d, name, phase_length))
            }
            CoreModelKind::Fetch => {
                let l1i = Box::new(LineFilterCache::new(&config.cache, config.general.line_bits));
                Self::Fetch(FetchModel::new(l1i, &config.core, name, phase_length))
            }
            CoreModelKind::Issue => Self::Issue(IssueModel::new(&config.core, name, phase_length)),
        }
    }
}

macro_rules! for_each_model {
    ($self:ident, $core:ident => $body:expr) => {
        match $self {
            CoreModel::Cache($core) => $body,
            CoreModel::Fetch($core) => $body,
            CoreModel::Issue($core) => $body,
        }
    };
}

impl Core for CoreModel {
    #[inline]
    fn name(&self) -> &str {
        for_each_model!(self, core => core.name())
    }

    #[inline]
    fn bbl(&mut self, bbl_addr: Address, bbl_info: &Arc<BblInfo>, globals: &mut SimGlobals) {
        for_each_model!(self, core => core.bbl(bbl_addr, bbl_info, globals))
    }

    #[inline]
    fn load(&mut self, addr: Address) {
        for_each_model!(self, core => core.load(addr))
    }

    #[inline]
    fn store(&mut self, addr: Address) {
        for_each_model!(self, core => core.store(addr))
    }

    #[inline]
    fn pred_load(&mut self, addr: Address, pred: bool) {
        for_each_model!(self, core => core.pred_load(addr, pred))
    }

    #[inline]
    fn pred_store(&mut self, addr: Address, pred: bool) {
        for_each_model!(self, core => core.pred_store(addr, pred))
    }

    #[inline]
    fn branch(&mut self, pc: Address, taken: bool, taken_npc: Address, not_taken_npc: Address) {
        for_each_model!(self, core => core.branch(pc, taken, taken_npc, not_taken_npc))
    }

    fn join(&mut self, globals: &SimGlobals) {
        for_each_model!(self, core => core.join(globals))
    }

    fn leave(&mut self) {
        for_each_model!(self, core => core.leave())
    }

    fn context_switch(&mut self, gid: i64) {
        for_each_model!(self, core => core.context_switch(gid))
    }

    fn c_sim_start(&mut self) {
        for_each_model!(self, core => core.c_sim_start())
    }

    fn c_sim_end(&mut self) {
        for_each_model!(self, core => core.c_sim_end())
    }

    fn event_recorder(&self) -> &CoreRecorder {
        for_each_model!(self, core => core.event_recorder())
    }

    fn cycles(&self) -> u64 {
        for_each_model!(self, core => core.cycles())
    }

    fn instrs(&self) -> u64 {
        for_each_model!(self, core => core.instrs())
    }

    fn phase_cycles(&self, phase_length: u64) -> u64 {
        for_each_model!(self, core => core.phase_cycles(phase_length))
    }

    fn cur_cycle(&self) -> Cycle {
        for_each_model!(self, core => core.cur_cycle())
    }

    fn decode_cycle(&self) -> Cycle {
        for_each_model!(self, core => core.decode_cycle())
    }

    fn phase_end_cycle(&self) -> Cycle {
        for_each_model!(self, core => core.phase_end_cycle())
    }

    fn push_phase_end(&mut self, phase_length: u64) {
        for_each_model!(self, core => core.push_phase_end(phase_length))
    }

    fn counters(&self) -> CoreCounters {
        for_each_model!(self, core => core.counters())
    }

    fn reg_ready_cycle(&self, reg: u16) -> Cycle {
        for_each_model!(self, core => core.reg_ready_cycle(reg))
    }
}
