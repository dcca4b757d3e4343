//! End-to-end runs: parse the reference, program the design, then either
//! check it against the reference or relay its console.

use std::io::Write;
use std::path::Path;
use std::sync::mpsc::Receiver;

use rvcheck_bus::SimBus;
use rvcheck_isa::Xlen;
use rvcheck_trace::{ParseConfig, TraceLog, TraceParser};
use tracing::{info, warn};

use crate::console::{Console, ExitReason};
use crate::cosim::{CheckConfig, CheckReport, Checker};
use crate::dut::DutModel;
use crate::error::{Error, Result};
use crate::loader::{LoadOptions, load_firmware};
use crate::metrics;
use crate::platform::Platform;
use crate::sim::{SimConfig, Simulation};

/// Everything a checked simulation run needs besides its inputs.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub sim: SimConfig,
    /// Bound on every bus handshake, in cycles.
    pub max_wait: Option<u64>,
    pub check: CheckConfig,
    pub load: LoadOptions,
}

/// Parse a reference log.
pub fn parse_trace(path: &Path, config: ParseConfig) -> Result<TraceLog> {
    let mut parser = TraceParser::new(config);
    let log = parser.parse_file(path)?;
    let stats = parser.stats();
    info!(
        path = %path.display(),
        entries = log.len(),
        lines = stats.lines,
        filtered = stats.filtered,
        skipped = stats.skipped,
        "trace parsed"
    );
    if !log.is_terminated() {
        warn!("trace has no terminal record, checking stops at its last entry");
    }
    metrics::record_trace(log.len());
    Ok(log)
}

/// Wrap a freshly reset simulation in a bus the platform code can drive.
pub fn simulated_platform<D: DutModel, X: Xlen>(
    dut: D,
    sim: &SimConfig,
    max_wait: Option<u64>,
) -> Result<SimBus<Simulation<D>, X>> {
    let mut sim = Simulation::new(dut, sim)?;
    sim.reset()?;
    let bus = SimBus::new(sim);
    Ok(match max_wait {
        Some(cycles) => bus.with_max_wait(cycles),
        None => bus,
    })
}

/// Program the design with `firmware` and check it against `trace`.
///
/// Loading failures are errors; everything found while stepping the
/// design is in the returned report.
pub fn check<D: DutModel, X: Xlen>(
    dut: D,
    trace: &TraceLog,
    firmware: &Path,
    options: &CheckOptions,
) -> Result<CheckReport> {
    let mut bus = simulated_platform::<D, X>(dut, &options.sim, options.max_wait)?;
    program(&mut bus, firmware, options.load)?;
    info!(beats = bus.beats(), "bus idle, starting co-simulation");

    let mut sim = bus.into_inner();
    let report = Checker::<_, X>::new(&mut sim, &options.check).run(trace);
    info!(
        instructions = report.instructions,
        cycles = report.cycles,
        mismatches = report.mismatches.len(),
        verdict = %report.verdict(),
        "co-simulation finished"
    );
    Ok(report)
}

/// Program the platform with `firmware` and relay its console until the
/// user quits or `input` closes.
pub fn console<P, X, W>(
    platform: &mut P,
    firmware: &Path,
    load: LoadOptions,
    console: &mut Console<X>,
    input: &Receiver<Vec<u8>>,
    output: &mut W,
) -> Result<ExitReason>
where
    P: Platform + ?Sized,
    X: Xlen,
    W: Write,
{
    platform.hold_core()?;
    console.reset(platform)?;
    program(platform, firmware, load)?;
    Ok(console.run(platform, input, output)?)
}

fn program<P: Platform + ?Sized>(platform: &mut P, firmware: &Path, load: LoadOptions) -> Result<()> {
    let report = load_firmware(platform, firmware, load)?;
    if !report.released {
        return Err(Error::FirmwareRejected {
            faults: report.faults.len(),
        });
    }
    Ok(())
}
