//! Decoded basic blocks.
//!
//! The instrumentation front-end decodes each basic block once into a
//! [`BblInfo`] (an instruction count, a byte length, and one [`DynUop`] per
//! micro-op) and caches it in a [`BblMap`] keyed by [`BasicBlockKey`]. The
//! timing cores treat `BblInfo` as an opaque, read-only handle; shared
//! ownership keeps a deferred block alive across callbacks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::Address;

/// Micro-op category; selects the per-uop LSU logic in the timing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UopKind {
    /// Plain execution uop; commits `lat` cycles after dispatch.
    #[default]
    General,
    /// Memory load; consumes the next buffered load address.
    Load,
    /// Store data uop; consumes the next buffered store address.
    Store,
    /// Store address-generation uop; later loads queue behind its commit.
    StoreAddr,
    /// Memory fence; serialises subsequent loads and stores.
    Fence,
}

/// Decode metadata for one micro-op.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DynUop {
    /// Decode-stage offset from the start of the block.
    pub dec_cycle: u32,
    /// Source architectural registers; index 0 means "none".
    pub rs: [u16; 2],
    /// Destination architectural registers; index 0 means "none".
    pub rd: [u16; 2],
    /// Execution latency in cycles.
    pub lat: u32,
    /// Bitmask of execution ports this uop may issue on.
    pub port_mask: u8,
    /// Extra consecutive cycles the issue port stays occupied.
    pub extra_slots: u32,
    /// Micro-op category.
    pub kind: UopKind,
}

/// The decoded uop sequence of one basic block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynBbl {
    /// Address of the first instruction.
    pub addr: Address,
    /// Micro-ops in program order.
    pub uops: Vec<DynUop>,
}

/// A decoded basic block as delivered by the front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BblInfo {
    /// Number of instructions in the block.
    pub instrs: u32,
    /// Length of the block in bytes (drives instruction fetch).
    pub bytes: u32,
    /// Decoded micro-ops.
    pub bbl: DynBbl,
}

/// Identity of a decoded basic block.
///
/// The same start address can decode to different blocks (e.g. after a
/// partial overlap), so the instruction count is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicBlockKey {
    /// Address of the first instruction.
    pub addr: Address,
    /// Number of instructions in the block.
    pub instrs: u64,
}

impl BasicBlockKey {
    /// Creates a key from a block address and instruction count.
    #[inline]
    pub fn new(addr: Address, instrs: u64) -> Self {
        Self { addr, instrs }
    }
}

impl Hash for BasicBlockKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.addr ^ (self.instrs << 32));
    }
}

/// Decode cache: `(addr, instrs)` → shared decoded block.
pub type BblMap = HashMap<BasicBlockKey, Arc<BblInfo>>;
