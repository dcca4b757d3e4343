//! Access to the design under test.
//!
//! A hardware model is reached through [`DutModel`]: raw signal and memory
//! access plus clock control. [`crate::Simulation`] builds the clocked view
//! the rest of the checker needs on top of it, and exposes the core's
//! architectural state through [`CoreProbe`].

mod library;

pub use library::{DutApi, DutError, SharedLibDut};

use std::path::Path;

use rvcheck_bus::axi::{AxiPort, AxiSignal};

/// Named wires of the design.
///
/// Core-level signals have fixed ids below `0x100`. AXI port wires are
/// numbered per port: `0x100` for the instruction port, `0x200` for the
/// data port, plus the [`AxiSignal`] discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Active-low core reset.
    CoreResetN,
    /// Active-low RAM reset.
    RamResetN,
    /// Program counter of the instruction being fetched.
    Pc,
    /// High during the cycle an instruction writes back.
    CommitValid,
    /// Register write port used to resynchronize the register file.
    GprWriteAddr,
    GprWriteData,
    GprWriteEnable,
    /// Free-running cycle counter.
    Mcycle,
    /// Retired instruction counter.
    Minstret,
    Axi(AxiPort, AxiSignal),
}

impl Signal {
    const AXI_BASE: u32 = 0x100;

    pub const fn id(self) -> u32 {
        match self {
            Self::CoreResetN => 0x01,
            Self::RamResetN => 0x02,
            Self::Pc => 0x10,
            Self::CommitValid => 0x11,
            Self::GprWriteAddr => 0x20,
            Self::GprWriteData => 0x21,
            Self::GprWriteEnable => 0x22,
            Self::Mcycle => 0x30,
            Self::Minstret => 0x31,
            Self::Axi(port, signal) => {
                let port = match port {
                    AxiPort::Instr => 1,
                    AxiPort::Data => 2,
                };
                port * Self::AXI_BASE + signal as u32
            }
        }
    }
}

/// Memories whose contents the model exposes by word index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Memory {
    /// General-purpose register file, indexed by register number.
    Gpr = 0,
    /// Data RAM, indexed by word.
    DataRam = 1,
}

/// Raw access to a hardware model.
///
/// None of these calls advance time; [`eval`](Self::eval) settles
/// combinational logic after inputs change.
pub trait DutModel {
    fn eval(&mut self);

    fn set_clock(&mut self, high: bool);

    fn peek(&self, signal: Signal) -> u64;

    fn poke(&mut self, signal: Signal, value: u64);

    fn peek_mem(&self, memory: Memory, index: u64) -> u64;

    fn poke_mem(&mut self, memory: Memory, index: u64, value: u64);

    /// Start recording a waveform to `path`.
    fn open_waveform(&mut self, path: &Path) -> Result<(), DutError> {
        Err(DutError::WaveformUnsupported(path.to_path_buf()))
    }

    /// Record the current signal values at `time` (in half cycles).
    fn dump_waveform(&mut self, _time: u64) {}
}

/// Architectural state of the core, as the comparator sees it.
pub trait CoreProbe {
    fn pc(&self) -> u64;

    /// Register `index`. `x0` always reads zero.
    fn gpr(&self, index: u8) -> u64;

    /// Counter backing `csr`, if the design exposes one.
    fn csr(&self, csr: u16) -> Option<u64>;

    fn commit_valid(&self) -> bool;

    /// Word `index` of the data RAM.
    fn data_word(&self, index: u64) -> u64;

    /// Overwrite register `index` through the register write port and
    /// settle the design.
    fn force_gpr(&mut self, index: u8, value: u64);
}
