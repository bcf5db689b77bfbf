//! Memory-side interface of the timing cores.
//!
//! The cores see the memory hierarchy through the L1 filter cache only:
//! an access returns the cycle at which it is satisfied, and a context
//! switch invalidates the virtually-addressed tags. Everything below L1 is
//! behind this interface.

/// Line-granular filter-cache implementation.
pub mod filter_cache;

pub use self::filter_cache::LineFilterCache;

use crate::common::{Address, Cycle};

/// L1 filter cache as seen by a timing core.
///
/// Responses are monotone in the request cycle. The filter latency does
/// not include the L1 access latency itself; the cores add it.
pub trait FilterCache {
    /// Issues a load at `req_cycle`; returns the response cycle.
    fn load(&mut self, addr: Address, req_cycle: Cycle) -> Cycle;

    /// Issues a store at `req_cycle`; returns the response cycle.
    fn store(&mut self, addr: Address, req_cycle: Cycle) -> Cycle;

    /// Invalidates all virtually-addressed tags.
    fn context_switch(&mut self);
}
