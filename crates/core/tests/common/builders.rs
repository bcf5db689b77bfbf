//! Builders for decoded blocks used across the scenarios.

use std::sync::Arc;

use ooo_core::bbl::{BblInfo, DynBbl, DynUop, UopKind};
use ooo_core::common::Address;

/// A uop with explicit kind, timing, and register assignment.
pub fn uop(kind: UopKind, dec_cycle: u32, lat: u32, rs: [u16; 2], rd: [u16; 2]) -> DynUop {
    DynUop {
        dec_cycle,
        rs,
        rd,
        lat,
        port_mask: 0b0011,
        extra_slots: 0,
        kind,
    }
}

/// A plain execution uop with no register dependencies.
pub fn general(dec_cycle: u32, lat: u32) -> DynUop {
    uop(UopKind::General, dec_cycle, lat, [0, 0], [0, 0])
}

/// A decoded block; the byte length assumes 4-byte instructions.
pub fn block(addr: Address, uops: Vec<DynUop>) -> Arc<BblInfo> {
    Arc::new(BblInfo {
        instrs: uops.len() as u32,
        bytes: 4 * uops.len() as u32,
        bbl: DynBbl { addr, uops },
    })
}
