use rvcheck_bus::{BusError, ClockError};
use rvcheck_trace::TraceError;
use thiserror::Error;

use crate::console::ConsoleError;
use crate::dut::DutError;
use crate::loader::LoadError;

/// Errors of an end-to-end run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("DUT error: {0}")]
    Dut(#[from] DutError),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error("firmware error: {0}")]
    Load(#[from] LoadError),
    #[error("console error: {0}")]
    Console(#[from] ConsoleError),
    #[error("firmware image has {faults} fault(s), core left in reset")]
    FirmwareRejected { faults: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
