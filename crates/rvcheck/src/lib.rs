//! rvcheck - RISC-V core verification against a reference commit trace
//!
//! A hardware model of the core is loaded from a shared library, clocked
//! by [`Simulation`], programmed over its AXI slave ports and then stepped
//! instruction by instruction against a parsed reference trace. The same
//! platform code also runs against the core on the FPGA through `/dev/mem`.
//!
//! # Example
//!
//! ```ignore
//! use rvcheck::{CheckOptions, Rv32, SharedLibDut, session};
//!
//! let trace = session::parse_trace("spike.log".as_ref(), Default::default())?;
//! let dut = SharedLibDut::open("libcore.so")?;
//! let report = session::check::<_, Rv32>(dut, &trace, "fw.hex".as_ref(), &CheckOptions::default())?;
//! println!("{}", report.verdict());
//! ```

pub use rvcheck_bus::{Bus, BusError, Clocked, MmioBus, SimBus};
pub use rvcheck_isa::{Rv32, Rv64, Xlen};
pub use rvcheck_mbox::{Endpoint, MailboxError};
pub use rvcheck_trace::{ParseConfig, TraceEntry, TraceError, TraceLog, TraceParser};

pub mod console;
pub mod cosim;
pub mod dut;
pub mod loader;
pub mod metrics;
pub mod platform;
pub mod session;
pub mod sim;

mod error;

pub use crate::console::{Console, ExitReason};
pub use cosim::{CheckConfig, CheckReport, Checker, CommitMode, CsrCorrection, Mismatch, Verdict};
pub use dut::{CoreProbe, DutError, DutModel, SharedLibDut};
pub use error::{Error, Result};
pub use loader::{FirmwareImage, LoadOptions, LoadReport};
pub use platform::{Board, Platform};
pub use session::CheckOptions;
pub use sim::{SimConfig, Simulation};
