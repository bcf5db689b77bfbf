//! Instruction-window port scheduler.
//!
//! Tracks execution-port occupancy over a sliding horizon of future cycles.
//! Each cycle slot holds a bitmask of claimed ports plus an entry count;
//! scheduling a uop claims the first free port matching its mask at the
//! earliest feasible cycle. Total in-flight entries are bounded by the
//! window capacity: when the window is full, the present must advance until
//! the oldest cycle's entries drain.
//!
//! The horizon is implemented as two equal arrays (the current and the next
//! window); when the position wraps, they swap. An operation that cannot be
//! placed within two horizons of the present indicates a runaway schedule
//! and aborts.

use crate::common::Cycle;

/// Cycles of lookahead in each of the two windows.
pub const SCHED_HORIZON: usize = 1024;

/// Port occupancy for one cycle slot.
#[derive(Debug, Clone, Copy, Default)]
struct PortSlot {
    occ_units: u8,
    count: u8,
}

/// Sliding-horizon execution-port scheduler.
#[derive(Debug)]
pub struct WindowStructure {
    cur_win: Vec<PortSlot>,
    next_win: Vec<PortSlot>,
    horizon: usize,
    capacity: u32,
    occupancy: u32,
    cur_pos: usize,
    last_port: u8,
}

impl WindowStructure {
    /// Creates a window with `horizon` cycles of lookahead per half and
    /// room for `capacity` in-flight entries.
    ///
    /// # Panics
    ///
    /// Panics if either parameter is zero.
    pub fn new(horizon: usize, capacity: u32) -> Self {
        assert!(horizon > 0, "window horizon must be non-zero");
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            cur_win: vec![PortSlot::default(); horizon],
            next_win: vec![PortSlot::default(); horizon],
            horizon,
            capacity,
            occupancy: 0,
            cur_pos: 0,
            last_port: 0,
        }
    }

    /// Entries currently in flight.
    #[inline]
    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    /// Schedules a uop needing a port in `port_mask` at or after
    /// `sched_cycle`, for `extra_slots + 1` consecutive cycles.
    ///
    /// On return `sched_cycle` is the granted cycle. `cur_cycle` may have
    /// been pushed forward if the window had to drain to make room.
    pub fn schedule(
        &mut self,
        cur_cycle: &mut Cycle,
        sched_cycle: &mut Cycle,
        port_mask: u8,
        extra_slots: u32,
    ) {
        if extra_slots == 0 {
            self.schedule_unit(cur_cycle, sched_cycle, port_mask, true, false);
        } else {
            self.schedule_unit(cur_cycle, sched_cycle, port_mask, true, true);
            // Long-latency ops occupy the granted port for extra cycles.
            // The slots are claimed speculatively and may land on
            // non-contiguous cycles if the port is contended; that is rare
            // enough not to model.
            let slot_mask = 1u8 << self.last_port;
            let mut slot_cycle = *sched_cycle + 1;
            for _ in 0..extra_slots {
                self.schedule_unit(cur_cycle, &mut slot_cycle, slot_mask, false, false);
                slot_cycle += 1;
            }
        }
        debug_assert!(self.occupancy <= self.capacity);
    }

    /// Advances the present by one cycle, draining the slot it leaves.
    pub fn advance_pos(&mut self, cur_cycle: &mut Cycle) {
        self.occupancy -= u32::from(self.cur_win[self.cur_pos].count);
        self.cur_win[self.cur_pos] = PortSlot::default();
        self.cur_pos += 1;
        *cur_cycle += 1;

        if self.cur_pos == self.horizon {
            // rebase: the drained current window becomes the fresh next one
            std::mem::swap(&mut self.cur_win, &mut self.next_win);
            self.cur_pos = 0;
        }
    }

    /// Advances in bulk to `target_cycle`, draining in-flight entries
    /// cycle by cycle and jumping once the window is empty.
    ///
    /// # Panics
    ///
    /// Panics if entries remain in flight at the target cycle; advance
    /// targets come from phase boundaries, which lie beyond any scheduled
    /// work.
    pub fn long_advance(&mut self, cur_cycle: &mut Cycle, target_cycle: Cycle) {
        while self.occupancy > 0 && *cur_cycle < target_cycle {
            self.advance_pos(cur_cycle);
        }
        assert!(
            self.occupancy == 0,
            "instruction window not drained advancing to cycle {target_cycle}"
        );
        *cur_cycle = target_cycle;
    }

    /// Claims a single slot. `occupy` distinguishes real entries (counted
    /// against capacity, any port in the mask) from extra-slot claims
    /// (uncounted, require the full mask free).
    fn schedule_unit(
        &mut self,
        cur_cycle: &mut Cycle,
        sched_cycle: &mut Cycle,
        port_mask: u8,
        occupy: bool,
        record_port: bool,
    ) {
        if occupy {
            while self.occupancy == self.capacity {
                self.advance_pos(cur_cycle);
            }
        }

        let delay = sched_cycle.saturating_sub(*cur_cycle) as usize;
        let mut win_pos = self.cur_pos + delay;
        loop {
            let claimed = if win_pos < self.horizon {
                Self::try_claim(&mut self.cur_win[win_pos], port_mask, occupy)
            } else if win_pos < 2 * self.horizon {
                Self::try_claim(&mut self.next_win[win_pos - self.horizon], port_mask, occupy)
            } else {
                panic!(
                    "no issue slot for port mask {port_mask:#04x} within {} cycles of cycle {}",
                    2 * self.horizon,
                    cur_cycle
                );
            };
            if let Some(port) = claimed {
                *sched_cycle = *cur_cycle + (win_pos - self.cur_pos) as Cycle;
                if occupy {
                    self.occupancy += 1;
                    if record_port {
                        self.last_port = port;
                    }
                }
                return;
            }
            win_pos += 1;
        }
    }

    /// Tries to claim a port in `slot`; returns the claimed port index.
    fn try_claim(slot: &mut PortSlot, port_mask: u8, occupy: bool) -> Option<u8> {
        let avail = !slot.occ_units & port_mask;
        if occupy {
            if avail == 0 {
                return None;
            }
            let unit = avail & avail.wrapping_neg();
            slot.occ_units |= unit;
            slot.count += 1;
            Some(unit.trailing_zeros() as u8)
        } else {
            // extra slots pin one specific port and leave the count alone
            if avail == port_mask {
                slot.occ_units |= port_mask;
                Some(port_mask.trailing_zeros() as u8)
            } else {
                None
            }
        }
    }
}
