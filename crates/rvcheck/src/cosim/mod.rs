//! Cycle-stepped co-simulation against a reference trace.
//!
//! The [`Checker`] walks a [`rvcheck_trace::TraceLog`] in program order
//! while clocking the design. For every reference instruction it waits for
//! the design to commit, then compares the architectural effects the
//! reference logged. Mismatches are collected into a [`CheckReport`]; the
//! run only stops early when asked to.

mod checker;

pub use checker::Checker;

use std::fmt;

use rvcheck_bus::ClockError;
use rvcheck_bus::status;
use rvcheck_isa::csr::{CSR_CYCLE, CSR_MCYCLE, csr_name};
use thiserror::Error;

/// How the checker decides that the design has retired an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Wait for the writeback-valid strobe, one cycle per poll.
    #[default]
    Strobe,
    /// Assume a fixed latency: `base` cycles per instruction, plus
    /// `memory_extra` for loads and stores.
    Fixed { base: u64, memory_extra: u64 },
}

impl CommitMode {
    /// Timing of a single-cycle core with a separate memory stage.
    pub const SINGLE_CYCLE: Self = Self::Fixed {
        base: 1,
        memory_extra: 1,
    };
}

/// Adjustment for a counter CSR the design reports with a pipeline skew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrCorrection {
    pub csr: u16,
    /// The register is expected to hold the design's counter minus this.
    pub offset: u64,
    /// Overwrite the destination with the reference value afterwards, so
    /// later instructions see what the reference saw.
    pub force: bool,
}

impl CsrCorrection {
    pub const fn new(csr: u16, offset: u64, force: bool) -> Self {
        Self { csr, offset, force }
    }

    /// Corrections for a single-cycle core whose cycle counter has already
    /// ticked once when the read commits.
    pub fn single_cycle() -> Vec<Self> {
        vec![
            Self::new(CSR_MCYCLE, 1, true),
            Self::new(CSR_CYCLE, 1, true),
        ]
    }
}

/// Configuration for a co-simulation run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Cycles run before the first instruction to fill the pipeline.
    pub fill_cycles: u64,
    pub commit: CommitMode,
    /// Cycles to wait for a strobe before giving up. `None` waits until the
    /// simulation's cycle ceiling.
    pub commit_timeout: Option<u64>,
    /// Check the design's PC against each instruction's address before it
    /// commits.
    pub check_fetch_pc: bool,
    /// Check the design's PC against the successor's address after commit.
    pub check_next_pc: bool,
    /// Offset bits of a store address inside the data RAM.
    pub data_window_mask: u64,
    pub csr_corrections: Vec<CsrCorrection>,
    pub stop_on_first: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            fill_cycles: 2,
            commit: CommitMode::default(),
            commit_timeout: None,
            check_fetch_pc: true,
            check_next_pc: true,
            data_window_mask: 0xffff,
            csr_corrections: CsrCorrection::single_cycle(),
            stop_on_first: false,
        }
    }
}

impl CheckConfig {
    pub fn correction(&self, csr: u16) -> Option<&CsrCorrection> {
        self.csr_corrections.iter().find(|c| c.csr == csr)
    }
}

/// What disagreed between the design and the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Design fetched from a different address.
    FetchPc,
    /// Design continued at a different address after commit.
    NextPc,
    /// Register writeback value.
    Register { rd: u8 },
    /// Store data found in the data RAM.
    Memory { addr: u64, bytes: usize },
    /// Corrected counter read.
    Csr { csr: u16, rd: u8 },
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchPc => write!(f, "fetch PC mismatch"),
            Self::NextPc => write!(f, "next PC mismatch"),
            Self::Register { rd } => write!(f, "x{rd} value mismatch"),
            Self::Memory { addr, bytes } => {
                write!(f, "{bytes}-byte store mismatch at {addr:#x}")
            }
            Self::Csr { csr, rd } => write!(f, "{} read into x{rd} mismatch", csr_name(*csr)),
        }
    }
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Position of the instruction in the trace.
    pub index: usize,
    pub address: u64,
    pub mnemonic: String,
    pub kind: MismatchKind,
    pub expected: u64,
    pub actual: u64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {:#x} `{}`: {} (expected {:#x}, got {:#x})",
            self.index, self.address, self.mnemonic, self.kind, self.expected, self.actual
        )
    }
}

/// A run that could not continue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("no commit for instruction at {address:#x} after {cycles} cycles")]
    CommitTimeout { address: u64, cycles: u64 },
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    /// Platform status code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => status::SUCCESS,
            Self::Failure => status::FAILURE,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Result of one co-simulation run.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Reference instructions checked, not counting the terminal record.
    pub instructions: usize,
    /// Cycles advanced by the checker, fill cycles included.
    pub cycles: u64,
    pub mismatches: Vec<Mismatch>,
    /// Set when the run ended before the trace did.
    pub aborted: Option<CheckError>,
}

impl CheckReport {
    pub fn verdict(&self) -> Verdict {
        if self.mismatches.is_empty() && self.aborted.is_none() {
            Verdict::Success
        } else {
            Verdict::Failure
        }
    }

    pub fn first_mismatch(&self) -> Option<&Mismatch> {
        self.mismatches.first()
    }
}

#[cfg(test)]
mod tests;
