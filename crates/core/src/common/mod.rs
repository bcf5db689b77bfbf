//! Common scalar types shared across the simulator.

/// A virtual address as observed by the instrumentation front-end.
pub type Address = u64;

/// A simulated cycle count. All models are issue-centric: a `Cycle` value
/// is anchored at the issue stage unless stated otherwise.
pub type Cycle = u64;

/// Identifier of a software thread; indexes the per-process core table.
pub type ThreadId = usize;

/// Address recorded for a predicated memory op whose predicate was false.
pub const INVALID_ADDRESS: Address = Address::MAX;
