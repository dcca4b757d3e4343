use std::marker::PhantomData;

use rvcheck_isa::Xlen;
use tracing::{trace, warn};

use crate::axi::{AxiAr, AxiAw, AxiB, AxiPort, AxiR, AxiSignal, AxiW, SignalPort};
use crate::{Bus, BusError, Clocked, INSTR_GRANULE, Result, check_transfer};

/// AXI size encoding of a 32-bit instruction beat.
const INSTR_AXI_SIZE: u8 = 0b010;
const INSTR_STROBE: u8 = 0x0F;

/// Bus backend that drives a simulated design's AXI slave ports.
///
/// Each beat runs the write address, write data and write response
/// handshakes strictly one after another (or address then data for reads).
/// Every wait advances the design by one full cycle per poll. Waits are
/// unbounded unless a limit is set with [`SimBus::with_max_wait`].
pub struct SimBus<T, X: Xlen> {
    target: T,
    max_wait: Option<u64>,
    beats: u64,
    _xlen: PhantomData<X>,
}

impl<T: SignalPort + Clocked, X: Xlen> SimBus<T, X> {
    pub const fn new(target: T) -> Self {
        Self {
            target,
            max_wait: None,
            beats: 0,
            _xlen: PhantomData,
        }
    }

    /// Fail a handshake that has not completed after `cycles` polls.
    #[must_use]
    pub const fn with_max_wait(mut self, cycles: u64) -> Self {
        self.max_wait = Some(cycles);
        self
    }

    pub const fn target(&self) -> &T {
        &self.target
    }

    pub const fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    /// Beats completed since construction.
    pub const fn beats(&self) -> u64 {
        self.beats
    }

    /// Advance one cycle at a time until `signal` is high.
    fn wait_high(
        &mut self,
        port: AxiPort,
        signal: AxiSignal,
        phase: &'static str,
        addr: u64,
    ) -> Result<()> {
        let mut waited = 0u64;
        while self.target.peek(port, signal) == 0 {
            if self.max_wait.is_some_and(|limit| waited >= limit) {
                warn!(port = %port, phase, addr = format!("{addr:#x}"), "handshake stalled");
                return Err(BusError::Timeout {
                    phase,
                    addr,
                    cycles: waited,
                });
            }
            self.target.cycle()?;
            waited += 1;
        }
        Ok(())
    }

    /// Hold `valid` until the slave raises `ready`, then clock the transfer
    /// and drop `valid`.
    fn handshake(
        &mut self,
        port: AxiPort,
        valid: AxiSignal,
        ready: AxiSignal,
        phase: &'static str,
        addr: u64,
    ) -> Result<()> {
        self.target.poke(port, valid, 1);
        self.wait_high(port, ready, phase, addr)?;
        self.target.cycle()?;
        self.target.poke(port, valid, 0);
        Ok(())
    }

    fn write_beat(&mut self, port: AxiPort, addr: u64, w: AxiW, size: u8) -> Result<()> {
        trace!(port = %port, addr = format!("{addr:#x}"), data = format!("{:#x}", w.data), "write beat");

        AxiAw::single(addr, size).drive(port, &mut self.target);
        self.handshake(port, AxiSignal::AwValid, AxiSignal::AwReady, "aw", addr)?;

        w.drive(port, &mut self.target);
        self.handshake(port, AxiSignal::WValid, AxiSignal::WReady, "w", addr)?;

        self.target.poke(port, AxiSignal::BReady, 1);
        self.wait_high(port, AxiSignal::BValid, "b", addr)?;
        let b = AxiB::sample(port, &self.target);
        self.target.cycle()?;
        self.target.poke(port, AxiSignal::BReady, 0);

        self.complete_beat();
        if b.is_ok() {
            Ok(())
        } else {
            Err(BusError::SlaveError { addr, resp: b.resp })
        }
    }

    fn read_beat(&mut self, port: AxiPort, addr: u64, size: u8) -> Result<u64> {
        AxiAr::single(addr, size).drive(port, &mut self.target);
        self.handshake(port, AxiSignal::ArValid, AxiSignal::ArReady, "ar", addr)?;

        self.target.poke(port, AxiSignal::RReady, 1);
        self.wait_high(port, AxiSignal::RValid, "r", addr)?;
        let r = AxiR::sample(port, &self.target);
        self.target.cycle()?;
        self.target.poke(port, AxiSignal::RReady, 0);

        trace!(port = %port, addr = format!("{addr:#x}"), data = format!("{:#x}", r.data), "read beat");
        self.complete_beat();
        if r.is_ok() {
            Ok(r.data)
        } else {
            Err(BusError::SlaveError { addr, resp: r.resp })
        }
    }

    fn complete_beat(&mut self) {
        self.beats += 1;
        metrics::counter!("rvcheck_bus_beats").increment(1);
    }
}

impl<T: SignalPort + Clocked, X: Xlen> Bus for SimBus<T, X> {
    fn word_bytes(&self) -> usize {
        X::REG_BYTES
    }

    fn write_instr(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        check_transfer(addr, data.len(), INSTR_GRANULE)?;
        for (i, chunk) in data.chunks_exact(INSTR_GRANULE).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let beat_addr = addr + (i * INSTR_GRANULE) as u64;
            let w = AxiW::last(word.into(), INSTR_STROBE);
            self.write_beat(AxiPort::Instr, beat_addr, w, INSTR_AXI_SIZE)?;
        }
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        check_transfer(addr, data.len(), X::REG_BYTES)?;
        for (i, chunk) in data.chunks_exact(X::REG_BYTES).enumerate() {
            let word = X::to_u64(X::reg_from_le(chunk));
            let beat_addr = addr + (i * X::REG_BYTES) as u64;
            let w = AxiW::last(word, X::FULL_STROBE);
            self.write_beat(AxiPort::Data, beat_addr, w, X::AXI_SIZE)?;
        }
        Ok(())
    }

    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<()> {
        check_transfer(addr, buf.len(), X::REG_BYTES)?;
        for (i, chunk) in buf.chunks_exact_mut(X::REG_BYTES).enumerate() {
            let beat_addr = addr + (i * X::REG_BYTES) as u64;
            let word = self.read_beat(AxiPort::Data, beat_addr, X::AXI_SIZE)?;
            X::reg_to_le(X::from_u64(word), chunk);
        }
        Ok(())
    }
}
