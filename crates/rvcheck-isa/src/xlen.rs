//! Register width types (XLEN).

use std::fmt::{Debug, Display, LowerHex};

/// Marker type for 32-bit register width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rv32;

/// Marker type for 64-bit register width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rv64;

/// Width-dependent constants and conversions.
///
/// The width also fixes the bus word: every transfer on the data port moves
/// exactly `REG_BYTES` bytes per beat.
pub trait Xlen: Copy + Clone + Send + Sync + Default + Debug + 'static {
    /// Register type (u32 for Rv32, u64 for Rv64).
    type Reg: Copy + Clone + Default + Eq + Ord + Debug + Display + LowerHex + Into<u64>;

    /// XLEN value (32 or 64).
    const VALUE: u8;

    /// Bytes per register and per bus word (4 or 8).
    const REG_BYTES: usize;

    /// AXI `size` encoding of one word (log2 of `REG_BYTES`).
    const AXI_SIZE: u8;

    /// Byte strobe with every lane of one word enabled.
    const FULL_STROBE: u8;

    /// Convert a u64 to register width.
    fn from_u64(val: u64) -> Self::Reg;

    /// Convert register to u64.
    fn to_u64(val: Self::Reg) -> u64;

    /// Drop the bits above register width.
    #[inline]
    fn truncate(val: u64) -> u64 {
        Self::to_u64(Self::from_u64(val))
    }

    /// Decode one little-endian word. `bytes` must hold `REG_BYTES` bytes.
    fn reg_from_le(bytes: &[u8]) -> Self::Reg;

    /// Encode one word little-endian into `out[..REG_BYTES]`.
    fn reg_to_le(val: Self::Reg, out: &mut [u8]);
}

impl Xlen for Rv32 {
    type Reg = u32;

    const VALUE: u8 = 32;
    const REG_BYTES: usize = 4;
    const AXI_SIZE: u8 = 0b010;
    const FULL_STROBE: u8 = 0x0F;

    #[inline]
    fn from_u64(val: u64) -> u32 {
        val as u32
    }

    #[inline]
    fn to_u64(val: u32) -> u64 {
        u64::from(val)
    }

    #[inline]
    fn reg_from_le(bytes: &[u8]) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[..4]);
        u32::from_le_bytes(word)
    }

    #[inline]
    fn reg_to_le(val: u32, out: &mut [u8]) {
        out[..4].copy_from_slice(&val.to_le_bytes());
    }
}

impl Xlen for Rv64 {
    type Reg = u64;

    const VALUE: u8 = 64;
    const REG_BYTES: usize = 8;
    const AXI_SIZE: u8 = 0b011;
    const FULL_STROBE: u8 = 0xFF;

    #[inline]
    fn from_u64(val: u64) -> u64 {
        val
    }

    #[inline]
    fn to_u64(val: u64) -> u64 {
        val
    }

    #[inline]
    fn reg_from_le(bytes: &[u8]) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(word)
    }

    #[inline]
    fn reg_to_le(val: u64, out: &mut [u8]) {
        out[..8].copy_from_slice(&val.to_le_bytes());
    }
}
