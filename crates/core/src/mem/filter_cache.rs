//! Line-granular L1 filter cache.
//!
//! A direct-mapped array of virtually-addressed line filters. Each line
//! tracks separate read and write tags (a read hit does not confer write
//! permission) and the cycle at which the line's data becomes available.
//! Hits resolve at the later of the request cycle and the line's
//! availability; misses charge a fixed backing-store latency.

use crate::common::{Address, Cycle, INVALID_ADDRESS};
use crate::config::FilterCacheConfig;
use crate::mem::FilterCache;

#[derive(Debug, Clone, Copy)]
struct FilterLine {
    rd_addr: Address,
    wr_addr: Address,
    avail_cycle: Cycle,
}

impl FilterLine {
    const INVALID: Self = Self {
        rd_addr: INVALID_ADDRESS,
        wr_addr: INVALID_ADDRESS,
        avail_cycle: 0,
    };
}

/// Direct-mapped, virtually-indexed line filter.
pub struct LineFilterCache {
    lines: Vec<FilterLine>,
    line_bits: u32,
    index_mask: u64,
    miss_latency: Cycle,
}

impl LineFilterCache {
    /// Creates a filter from its configuration and the global line size.
    pub fn new(config: &FilterCacheConfig, line_bits: u32) -> Self {
        config.validate();
        Self {
            lines: vec![FilterLine::INVALID; config.num_lines],
            line_bits,
            index_mask: config.num_lines as u64 - 1,
            miss_latency: config.miss_latency,
        }
    }

    #[inline]
    fn line_of(&self, addr: Address) -> (u64, usize) {
        let line = addr >> self.line_bits;
        (line, (line & self.index_mask) as usize)
    }
}

impl FilterCache for LineFilterCache {
    fn load(&mut self, addr: Address, req_cycle: Cycle) -> Cycle {
        let (line, idx) = self.line_of(addr);
        let entry = &mut self.lines[idx];
        if entry.rd_addr == line {
            req_cycle.max(entry.avail_cycle)
        } else {
            let resp_cycle = req_cycle + self.miss_latency;
            entry.rd_addr = line;
            entry.wr_addr = INVALID_ADDRESS;
            entry.avail_cycle = resp_cycle;
            resp_cycle
        }
    }

    fn store(&mut self, addr: Address, req_cycle: Cycle) -> Cycle {
        let (line, idx) = self.line_of(addr);
        let entry = &mut self.lines[idx];
        if entry.wr_addr == line {
            req_cycle.max(entry.avail_cycle)
        } else {
            let resp_cycle = req_cycle + self.miss_latency;
            entry.rd_addr = line;
            entry.wr_addr = line;
            entry.avail_cycle = resp_cycle;
            resp_cycle
        }
    }

    fn context_switch(&mut self) {
        self.lines.fill(FilterLine::INVALID);
    }
}
