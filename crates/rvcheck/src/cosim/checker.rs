use std::marker::PhantomData;

use rvcheck_bus::Clocked;
use rvcheck_isa::csr::csr_name;
use rvcheck_isa::{InstrClass, StoreWidth, Xlen};
use rvcheck_trace::{TraceEntry, TraceLog};
use tracing::{debug, error, info, trace, warn};

use super::{CheckConfig, CheckError, CheckReport, CommitMode, Mismatch, MismatchKind};
use crate::dut::CoreProbe;
use crate::metrics;

/// Where the walk is for the current reference instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Clocking until the design retires the instruction. `pc_checked` is
    /// set when the previous next-PC check already covered its address.
    WaitingForCommit { waited: u64, pc_checked: bool },
    /// Retired; its effects are visible.
    Checking,
}

/// Steps a design through a reference trace and compares every commit.
pub struct Checker<'a, P, X: Xlen> {
    core: &'a mut P,
    config: &'a CheckConfig,
    cycles: u64,
    mismatches: Vec<Mismatch>,
    _xlen: PhantomData<X>,
}

impl<'a, P: Clocked + CoreProbe, X: Xlen> Checker<'a, P, X> {
    pub const fn new(core: &'a mut P, config: &'a CheckConfig) -> Self {
        Self {
            core,
            config,
            cycles: 0,
            mismatches: Vec::new(),
            _xlen: PhantomData,
        }
    }

    /// Run the whole trace.
    ///
    /// Never fails: a run cut short by the cycle ceiling or a commit timeout
    /// is reported through [`CheckReport::aborted`] together with every
    /// mismatch found until then.
    pub fn run(mut self, trace: &TraceLog) -> CheckReport {
        let mut instructions = 0;
        let outcome = self.walk(trace, &mut instructions);
        if let Err(err) = &outcome {
            error!(error = %err, checked = instructions, "co-simulation aborted");
        }
        metrics::record_cycles(self.cycles);

        CheckReport {
            instructions,
            cycles: self.cycles,
            mismatches: self.mismatches,
            aborted: outcome.err(),
        }
    }

    fn walk(&mut self, trace: &TraceLog, checked: &mut usize) -> Result<(), CheckError> {
        for _ in 0..self.config.fill_cycles {
            self.step()?;
        }

        let mut index = 0;
        let mut phase = Phase::WaitingForCommit {
            waited: 0,
            pc_checked: false,
        };
        while let Some(entry) = trace.get(index) {
            if entry.terminal {
                debug!(pc = format!("{:#x}", entry.address), "terminal record reached");
                break;
            }

            phase = match phase {
                Phase::WaitingForCommit { waited, pc_checked } => {
                    if waited == 0 && !pc_checked && self.config.check_fetch_pc {
                        self.check_fetch_pc(index, entry);
                    }
                    self.step()?;
                    let waited = waited + 1;
                    if self.committed(entry, waited) {
                        metrics::record_commit_latency(waited);
                        Phase::Checking
                    } else {
                        self.check_timeout(entry, waited)?;
                        Phase::WaitingForCommit { waited, pc_checked }
                    }
                }
                Phase::Checking => {
                    self.check_effects(index, entry);
                    let mut pc_checked = false;
                    if self.config.check_next_pc
                        && let Some(next) = trace.next_of(index)
                    {
                        self.check_next_pc(index, entry, next);
                        pc_checked = true;
                    }
                    *checked += 1;
                    metrics::record_instruction();
                    index += 1;

                    if self.config.stop_on_first && !self.mismatches.is_empty() {
                        info!(checked = *checked, "stopping at first mismatch");
                        break;
                    }
                    Phase::WaitingForCommit {
                        waited: 0,
                        pc_checked,
                    }
                }
            };
        }

        // Let the last commit settle.
        self.step()?;
        Ok(())
    }

    fn step(&mut self) -> Result<(), CheckError> {
        self.core.cycle()?;
        self.cycles += 1;
        Ok(())
    }

    fn committed(&self, entry: &TraceEntry, waited: u64) -> bool {
        match self.config.commit {
            CommitMode::Strobe => self.core.commit_valid(),
            CommitMode::Fixed { base, memory_extra } => {
                let extra = if entry.class().is_memory() {
                    memory_extra
                } else {
                    0
                };
                waited >= (base + extra).max(1)
            }
        }
    }

    fn check_timeout(&self, entry: &TraceEntry, waited: u64) -> Result<(), CheckError> {
        match self.config.commit_timeout {
            Some(limit) if waited >= limit => {
                warn!(
                    pc = format!("{:#x}", entry.address),
                    instr = %entry.mnemonic,
                    cycles = waited,
                    "commit strobe never asserted"
                );
                Err(CheckError::CommitTimeout {
                    address: entry.address,
                    cycles: waited,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_fetch_pc(&mut self, index: usize, entry: &TraceEntry) {
        let expected = X::truncate(entry.address);
        let actual = X::truncate(self.core.pc());
        if actual != expected {
            self.record(index, entry, MismatchKind::FetchPc, expected, actual);
        }
    }

    fn check_next_pc(&mut self, index: usize, entry: &TraceEntry, next: &TraceEntry) {
        let expected = X::truncate(next.address);
        let actual = X::truncate(self.core.pc());
        if actual != expected {
            self.record(index, entry, MismatchKind::NextPc, expected, actual);
        }
    }

    fn check_effects(&mut self, index: usize, entry: &TraceEntry) {
        match entry.class() {
            InstrClass::Store { width } => self.check_store(index, entry, width),
            InstrClass::CsrRead { csr } => self.check_csr_read(index, entry, csr),
            InstrClass::Load | InstrClass::System | InstrClass::Other => {
                self.check_writeback(index, entry);
            }
        }
    }

    /// Compare the bytes a store left in the data RAM.
    fn check_store(&mut self, index: usize, entry: &TraceEntry, width: StoreWidth) {
        let (Some(addr), Some(value)) = (entry.mem_addr, entry.mem_value) else {
            debug!(
                pc = format!("{:#x}", entry.address),
                "store without logged data, not checked"
            );
            return;
        };

        let word_bytes = X::REG_BYTES as u64;
        let lane = addr & (word_bytes - 1);
        let word_index = (addr & self.config.data_window_mask) / word_bytes;
        let word = self.core.data_word(word_index);

        let expected = value & width.mask();
        let actual = (word >> (lane * 8)) & width.mask();
        trace!(
            addr = format!("{addr:#x}"),
            word = format!("{word:#x}"),
            width = width.mnemonic(),
            "store check"
        );
        if actual != expected {
            let kind = MismatchKind::Memory {
                addr,
                bytes: width.bytes(),
            };
            self.record(index, entry, kind, expected, actual);
        }
    }

    /// Compare a counter read against the design's own counter, then
    /// optionally resynchronize the destination register.
    fn check_csr_read(&mut self, index: usize, entry: &TraceEntry, csr: u16) {
        let Some(rd) = entry.rd else {
            return;
        };
        let Some(correction) = self.config.correction(csr).copied() else {
            self.check_writeback(index, entry);
            return;
        };

        match self.core.csr(csr) {
            Some(counter) => {
                let expected = X::truncate(counter.wrapping_sub(correction.offset));
                let actual = X::truncate(self.core.gpr(rd));
                if actual != expected {
                    self.record(index, entry, MismatchKind::Csr { csr, rd }, expected, actual);
                }
            }
            None => {
                warn!(
                    csr = csr_name(csr),
                    "design exposes no counter for corrected CSR, using reference value"
                );
                self.check_writeback(index, entry);
            }
        }

        if correction.force {
            let value = X::truncate(entry.rd_value);
            trace!(rd, value = format!("{value:#x}"), "resynchronizing register");
            self.core.force_gpr(rd, value);
        }
    }

    fn check_writeback(&mut self, index: usize, entry: &TraceEntry) {
        let Some(rd) = entry.rd else {
            return;
        };
        let expected = X::truncate(entry.rd_value);
        let actual = X::truncate(self.core.gpr(rd));
        if actual != expected {
            self.record(index, entry, MismatchKind::Register { rd }, expected, actual);
        }
    }

    fn record(
        &mut self,
        index: usize,
        entry: &TraceEntry,
        kind: MismatchKind,
        expected: u64,
        actual: u64,
    ) {
        error!(
            pc = format!("{:#x}", entry.address),
            instr = %entry.mnemonic,
            expected = format!("{expected:#x}"),
            actual = format!("{actual:#x}"),
            "{kind}"
        );
        metrics::record_mismatch(&kind);
        self.mismatches.push(Mismatch {
            index,
            address: entry.address,
            mnemonic: entry.mnemonic.clone(),
            kind,
            expected,
            actual,
        });
    }
}
