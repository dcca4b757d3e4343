use thiserror::Error;

use crate::ClockError;

/// Numeric status codes shared with firmware and the platform tools.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const FAILURE: u8 = 0x01;
    pub const ADDR_NOT_ALIGNED: u8 = 0x02;
    pub const INVALID_ADDR: u8 = 0x03;
    pub const INVALID_SIZE: u8 = 0x04;
    pub const OVERFLOW: u8 = 0x05;
}

/// Bus transaction errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("empty transfer at {addr:#x}")]
    EmptyTransfer { addr: u64 },

    #[error("transfer of {len} bytes at {addr:#x} is not aligned to {granule} bytes")]
    Misaligned { addr: u64, len: usize, granule: usize },

    #[error("no mapping established for the {port} port")]
    NotMapped { port: &'static str },

    #[error("transfer of {len} bytes at {addr:#x} exceeds the {window:#x} byte window")]
    OutOfWindow { addr: u64, len: usize, window: usize },

    #[error("{phase} handshake at {addr:#x} not completed after {cycles} cycles")]
    Timeout {
        phase: &'static str,
        addr: u64,
        cycles: u64,
    },

    #[error("slave responded {resp:#04b} to transaction at {addr:#x}")]
    SlaveError { addr: u64, resp: u8 },

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("mmap failed: {0}")]
    Mmap(#[from] nix::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Status code reported to callers that speak the numeric protocol.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Misaligned { .. } => status::ADDR_NOT_ALIGNED,
            Self::NotMapped { .. } | Self::OutOfWindow { .. } => status::INVALID_ADDR,
            Self::EmptyTransfer { .. }
            | Self::Timeout { .. }
            | Self::SlaveError { .. }
            | Self::Clock(_)
            | Self::Mmap(_)
            | Self::Io(_) => status::FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
