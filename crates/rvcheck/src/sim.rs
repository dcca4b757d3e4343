//! Clocked driver around a hardware model.

use std::path::PathBuf;

use rvcheck_bus::axi::{AxiPort, AxiSignal, SignalPort};
use rvcheck_bus::{ClockError, Clocked};
use rvcheck_isa::csr::{CSR_CYCLE, CSR_INSTRET, CSR_MCYCLE, CSR_MINSTRET};
use tracing::{debug, warn};

use crate::dut::{CoreProbe, DutError, DutModel, Memory, Signal};

/// Default cycle ceiling of one simulation run.
pub const DEFAULT_MAX_CYCLES: u64 = 2_000_000;

#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Full cycles after which every further clock edge fails.
    pub max_cycles: u64,
    /// Waveform output, if the model supports it.
    pub waveform: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            waveform: None,
        }
    }
}

/// A hardware model driven by a single clock.
///
/// Time only moves through [`Clocked::half_cycle`]; everything else reads
/// or drives signals at the current instant. The cycle ceiling is the only
/// bound on how long any wait in the checker, bus or mailbox can spin.
pub struct Simulation<D: DutModel> {
    dut: D,
    clock: bool,
    half_cycles: u64,
    max_cycles: u64,
    waveform: bool,
}

impl<D: DutModel> Simulation<D> {
    pub fn new(mut dut: D, config: &SimConfig) -> Result<Self, DutError> {
        let waveform = match &config.waveform {
            Some(path) => {
                dut.open_waveform(path)?;
                true
            }
            None => false,
        };
        dut.set_clock(false);
        dut.eval();
        Ok(Self {
            dut,
            clock: false,
            half_cycles: 0,
            max_cycles: config.max_cycles,
            waveform,
        })
    }

    pub const fn dut(&self) -> &D {
        &self.dut
    }

    pub const fn dut_mut(&mut self) -> &mut D {
        &mut self.dut
    }

    /// Full cycles elapsed.
    pub const fn cycles(&self) -> u64 {
        self.half_cycles / 2
    }

    pub const fn max_cycles(&self) -> u64 {
        self.max_cycles
    }

    /// Put the design in a known state.
    ///
    /// Holds both resets for one cycle, then releases the RAMs so they can be
    /// programmed over the bus. The core stays in reset until
    /// [`release_core`](Self::release_core).
    pub fn reset(&mut self) -> Result<(), ClockError> {
        self.dut.poke(Signal::CoreResetN, 0);
        self.dut.poke(Signal::RamResetN, 0);
        self.dut.eval();
        self.cycle()?;
        self.dut.poke(Signal::RamResetN, 1);
        self.dut.eval();
        debug!(cycles = self.cycles(), "design reset, RAMs released");
        Ok(())
    }

    pub fn hold_core(&mut self) {
        self.dut.poke(Signal::CoreResetN, 0);
        self.dut.eval();
    }

    pub fn release_core(&mut self) {
        self.dut.poke(Signal::CoreResetN, 1);
        self.dut.eval();
        debug!(cycles = self.cycles(), "core reset released");
    }
}

impl<D: DutModel> Clocked for Simulation<D> {
    fn half_cycle(&mut self) -> Result<(), ClockError> {
        if self.cycles() >= self.max_cycles {
            warn!(limit = self.max_cycles, "cycle ceiling reached");
            return Err(ClockError::CycleLimit {
                limit: self.max_cycles,
            });
        }
        self.dut.eval();
        self.clock = !self.clock;
        self.dut.set_clock(self.clock);
        self.dut.eval();
        if self.waveform {
            self.dut.dump_waveform(self.half_cycles);
        }
        self.half_cycles += 1;
        Ok(())
    }

    fn eval(&mut self) {
        self.dut.eval();
    }
}

impl<D: DutModel> SignalPort for Simulation<D> {
    fn poke(&mut self, port: AxiPort, signal: AxiSignal, value: u64) {
        self.dut.poke(Signal::Axi(port, signal), value);
    }

    fn peek(&self, port: AxiPort, signal: AxiSignal) -> u64 {
        self.dut.peek(Signal::Axi(port, signal))
    }
}

impl<D: DutModel> CoreProbe for Simulation<D> {
    fn pc(&self) -> u64 {
        self.dut.peek(Signal::Pc)
    }

    fn gpr(&self, index: u8) -> u64 {
        if index == 0 {
            return 0;
        }
        self.dut.peek_mem(Memory::Gpr, u64::from(index))
    }

    fn csr(&self, csr: u16) -> Option<u64> {
        match csr {
            CSR_MCYCLE | CSR_CYCLE => Some(self.dut.peek(Signal::Mcycle)),
            CSR_MINSTRET | CSR_INSTRET => Some(self.dut.peek(Signal::Minstret)),
            _ => None,
        }
    }

    fn commit_valid(&self) -> bool {
        self.dut.peek(Signal::CommitValid) != 0
    }

    fn data_word(&self, index: u64) -> u64 {
        self.dut.peek_mem(Memory::DataRam, index)
    }

    fn force_gpr(&mut self, index: u8, value: u64) {
        self.dut.poke(Signal::GprWriteAddr, u64::from(index));
        self.dut.poke(Signal::GprWriteData, value);
        self.dut.poke(Signal::GprWriteEnable, 1);
        self.dut.eval();
        self.dut.poke(Signal::GprWriteEnable, 0);
    }
}
