//! Address map of the softcore as seen through the fabric interface.
//!
//! Offsets are relative to the fabric window; physical addresses are the
//! window base plus the offset.

/// Physical base of the fabric interface window on the FPGA host.
pub const FIC0_BASE: u64 = 0x6000_0000;
pub const FIC0_SIZE: usize = 0x2000_0000;

/// Bits of an absolute address that select a location inside the window.
pub const FABRIC_OFFSET_MASK: u64 = 0x00FF_FFFF;

/// A contiguous RAM inside the fabric window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub base: u64,
    pub size: usize,
}

impl Region {
    pub const fn new(base: u64, size: usize) -> Self {
        Self { base, size }
    }

    pub const fn end(&self) -> u64 {
        self.base + self.size as u64
    }

    /// True if `[addr, addr + len)` lies inside the region.
    pub const fn contains(&self, addr: u64, len: usize) -> bool {
        addr >= self.base && addr + len as u64 <= self.end()
    }
}

pub const INSTR_RAM: Region = Region::new(0x0_0000, 0x4000);
pub const DATA_RAM: Region = Region::new(0x1_0000, 0x3000);
pub const PTC_RAM: Region = Region::new(0x2_0000, 0x400);
pub const CTP_RAM: Region = Region::new(0x3_0000, 0x400);

/// Strip the window base from an absolute address.
pub const fn normalize(addr: u64) -> u64 {
    addr & FABRIC_OFFSET_MASK
}
