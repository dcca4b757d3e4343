//! Opcode-family classification.
//!
//! All raw bit masking for the checker lives here. Callers match on
//! [`InstrClass`] instead of testing opcode bits themselves.

const OPCODE_LOAD: u8 = 0b000_0011;
const OPCODE_STORE: u8 = 0b010_0011;
const OPCODE_SYSTEM: u8 = 0b111_0011;

/// Extract opcode field (bits [6:0]).
#[inline]
pub const fn decode_opcode(instr: u32) -> u8 {
    (instr & 0x7F) as u8
}

/// Extract rd field (bits [11:7]).
#[inline]
pub const fn decode_rd(instr: u32) -> u8 {
    ((instr >> 7) & 0x1F) as u8
}

/// Extract funct3 field (bits [14:12]).
#[inline]
pub const fn decode_funct3(instr: u32) -> u8 {
    ((instr >> 12) & 0x7) as u8
}

/// Access width of a store, from its funct3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreWidth {
    Byte,
    Half,
    Word,
    Double,
}

impl StoreWidth {
    const fn from_funct3(funct3: u8) -> Option<Self> {
        match funct3 {
            0b000 => Some(Self::Byte),
            0b001 => Some(Self::Half),
            0b010 => Some(Self::Word),
            0b011 => Some(Self::Double),
            _ => None,
        }
    }

    /// Number of bytes written.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::Double => 8,
        }
    }

    /// Mask selecting the written bytes of a right-aligned value.
    pub const fn mask(self) -> u64 {
        match self {
            Self::Byte => 0xFF,
            Self::Half => 0xFFFF,
            Self::Word => 0xFFFF_FFFF,
            Self::Double => u64::MAX,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Byte => "sb",
            Self::Half => "sh",
            Self::Word => "sw",
            Self::Double => "sd",
        }
    }
}

/// Opcode family of a retiring instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrClass {
    /// Memory write; verified against the design's data memory.
    Store { width: StoreWidth },
    /// Memory read with a register writeback; needs an extra memory cycle.
    Load,
    /// Zicsr access (`csrr*`); the destination receives the old CSR value.
    CsrRead { csr: u16 },
    /// `ecall`/`ebreak`/`mret`/`wfi`: funct3 zero under the system opcode.
    System,
    /// Everything else: plain register writeback or no architectural effect.
    Other,
}

impl InstrClass {
    /// True for families that occupy the memory stage for one more cycle.
    pub const fn is_memory(self) -> bool {
        matches!(self, Self::Store { .. } | Self::Load)
    }
}

/// Classify a 32-bit encoding by its opcode family.
pub const fn classify(encoding: u32) -> InstrClass {
    let funct3 = decode_funct3(encoding);
    match decode_opcode(encoding) {
        OPCODE_LOAD => InstrClass::Load,
        OPCODE_STORE => match StoreWidth::from_funct3(funct3) {
            Some(width) => InstrClass::Store { width },
            None => InstrClass::Other,
        },
        OPCODE_SYSTEM if funct3 == 0 => InstrClass::System,
        OPCODE_SYSTEM => InstrClass::CsrRead {
            csr: ((encoding >> 20) & 0xFFF) as u16,
        },
        _ => InstrClass::Other,
    }
}
