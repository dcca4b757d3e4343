//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rvcheck::cosim::CsrCorrection;
use rvcheck::platform::BOARD_RESET_LINE;
use rvcheck::sim::DEFAULT_MAX_CYCLES;
use rvcheck::{CheckConfig, CommitMode, ParseConfig, SimConfig};
use rvcheck_isa::csr::csr_number;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "rvcheck")]
#[command(about = "RISC-V core verification against a Spike commit trace")]
#[command(version)]
pub struct Cli {
    /// Register width of the core
    #[arg(long, value_enum, global = true, default_value = "32")]
    pub xlen: XlenArg,

    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(
        short,
        long,
        visible_alias = "silent",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run firmware on a simulated core and compare it against a reference trace
    Check {
        /// Shared library with the core model
        #[arg(long, value_name = "LIB")]
        dut: PathBuf,

        /// Spike commit log of the same firmware (plain or .zst)
        #[arg(long, value_name = "LOG")]
        trace: PathBuf,

        /// Firmware image, one `addr:data` hex pair per line
        #[arg(long, value_name = "IMAGE")]
        firmware: PathBuf,

        #[command(flatten)]
        parse: ParseArgs,

        /// Cycles run before the first instruction to fill the pipeline
        #[arg(long, default_value = "2")]
        fill_cycles: u64,

        /// How a commit is detected
        #[arg(long, value_enum, default_value = "strobe")]
        commit: CommitArg,

        /// Give up when a commit takes longer than this many cycles
        #[arg(long, value_name = "CYCLES")]
        commit_timeout: Option<u64>,

        /// Stop at the first mismatch
        #[arg(long)]
        stop_on_first: bool,

        /// Compare counter reads verbatim instead of correcting the skew
        #[arg(long)]
        no_csr_correction: bool,

        /// Counter skew as `<csr>:<offset>[:force]`, replacing the default
        /// table (repeatable; csr by name or hex number)
        #[arg(
            long,
            value_name = "CSR:OFFSET[:force]",
            value_parser = parse_csr_correction,
            conflicts_with = "no_csr_correction"
        )]
        csr_correction: Vec<CsrCorrection>,

        /// Skip the fetch and next PC checks
        #[arg(long)]
        no_pc_check: bool,

        #[command(flatten)]
        sim: SimArgs,
    },
    /// Load firmware and attach stdin/stdout to the core's mailbox
    Console {
        /// Shared library with the core model
        #[arg(
            long,
            value_name = "LIB",
            conflicts_with = "hardware",
            required_unless_present = "hardware"
        )]
        dut: Option<PathBuf>,

        /// Talk to the core on the FPGA through /dev/mem
        #[arg(long)]
        hardware: bool,

        /// Firmware image, one `addr:data` hex pair per line
        #[arg(long, value_name = "IMAGE")]
        firmware: PathBuf,

        /// sysfs file driving the core reset (with --hardware)
        #[arg(long, default_value = BOARD_RESET_LINE)]
        reset_line: PathBuf,

        /// Quiet polls to wait for output after stdin closes
        #[arg(long, default_value = "1000")]
        drain_polls: u64,

        #[command(flatten)]
        sim: SimArgs,
    },
    /// Parse a reference trace and print it
    Trace {
        /// Spike commit log (plain or .zst)
        #[arg(value_name = "LOG")]
        log: PathBuf,

        #[command(flatten)]
        parse: ParseArgs,

        /// Print only the instruction mix
        #[arg(long)]
        summary: bool,
    },
}

/// Reference trace parsing options.
#[derive(Args, Clone, Copy, Debug)]
pub struct ParseArgs {
    /// Records fetched below this address are dropped
    #[arg(long, value_name = "ADDR", value_parser = parse_hex, default_value = "0x80000000")]
    pub user_base: u64,
}

impl ParseArgs {
    pub fn config(&self) -> ParseConfig {
        ParseConfig {
            user_base: self.user_base,
            ..ParseConfig::default()
        }
    }
}

/// Simulation limits.
#[derive(Args, Clone, Debug)]
pub struct SimArgs {
    /// Cycle ceiling of the simulation
    #[arg(long, default_value_t = DEFAULT_MAX_CYCLES)]
    pub max_cycles: u64,

    /// Cycles a bus handshake may wait before it fails
    #[arg(long, default_value = "10000")]
    pub max_wait: u64,

    /// Write a waveform to this file (if the model supports it)
    #[arg(long, value_name = "FILE")]
    pub waveform: Option<PathBuf>,
}

impl SimArgs {
    pub fn config(&self) -> SimConfig {
        SimConfig {
            max_cycles: self.max_cycles,
            waveform: self.waveform.clone(),
        }
    }
}

/// Checker options taken from `check`.
pub struct CheckArgs {
    pub fill_cycles: u64,
    pub commit: CommitArg,
    pub commit_timeout: Option<u64>,
    pub stop_on_first: bool,
    pub no_csr_correction: bool,
    pub csr_corrections: Vec<CsrCorrection>,
    pub no_pc_check: bool,
}

impl CheckArgs {
    pub fn config(&self) -> CheckConfig {
        CheckConfig {
            fill_cycles: self.fill_cycles,
            commit: self.commit.into(),
            commit_timeout: self.commit_timeout,
            check_fetch_pc: !self.no_pc_check,
            check_next_pc: !self.no_pc_check,
            csr_corrections: if self.no_csr_correction {
                Vec::new()
            } else if self.csr_corrections.is_empty() {
                CsrCorrection::single_cycle()
            } else {
                self.csr_corrections.clone()
            },
            stop_on_first: self.stop_on_first,
            ..CheckConfig::default()
        }
    }
}

fn parse_hex(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{s}': {e}"))
}

/// Parse `<csr>:<offset>[:force]`, e.g. `mcycle:2:force` or `0xc00:1`.
fn parse_csr_correction(s: &str) -> Result<CsrCorrection, String> {
    let mut fields = s.split(':');
    let (Some(csr), Some(offset)) = (fields.next(), fields.next()) else {
        return Err(format!("expected <csr>:<offset>[:force], got '{s}'"));
    };
    let csr = csr_number(csr)
        .or_else(|| {
            parse_hex(csr)
                .ok()
                .and_then(|number| u16::try_from(number).ok())
                .filter(|&number| number < 0x1000)
        })
        .ok_or_else(|| format!("unknown CSR '{csr}'"))?;
    let offset = offset
        .parse::<u64>()
        .map_err(|e| format!("invalid offset '{offset}': {e}"))?;
    let force = match fields.next() {
        None => false,
        Some("force") => true,
        Some(other) => return Err(format!("expected 'force', got '{other}'")),
    };
    if fields.next().is_some() {
        return Err(format!("expected <csr>:<offset>[:force], got '{s}'"));
    }
    Ok(CsrCorrection::new(csr, offset, force))
}

// ============================================================================
// Argument types with conversions
// ============================================================================

/// Register width.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum XlenArg {
    #[default]
    #[value(name = "32")]
    Rv32,
    #[value(name = "64")]
    Rv64,
}

/// Commit detection mode.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum CommitArg {
    /// Wait for the writeback-valid strobe
    #[default]
    Strobe,
    /// One cycle per instruction, two for loads and stores
    Fixed,
}

impl From<CommitArg> for CommitMode {
    fn from(arg: CommitArg) -> Self {
        match arg {
            CommitArg::Strobe => Self::Strobe,
            CommitArg::Fixed => Self::SINGLE_CYCLE,
        }
    }
}
