use std::fmt;

use rvcheck_isa::{InstrClass, classify};

/// One retired reference instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Hart that retired the instruction (informational).
    pub core_id: u8,
    /// Fetch PC.
    pub address: u64,
    /// Raw 32-bit instruction bits.
    pub encoding: u32,
    /// Disassembly, truncated to the parser's mnemonic capacity.
    pub mnemonic: String,
    /// Destination register, `None` when nothing is written back.
    pub rd: Option<u8>,
    /// Value written to `rd` (zero without a writeback).
    pub rd_value: u64,
    /// Address of the memory access (loads and stores).
    pub mem_addr: Option<u64>,
    /// Data written by a store.
    pub mem_value: Option<u64>,
    /// Sentinel record that ends the program.
    pub terminal: bool,
}

impl TraceEntry {
    /// Opcode family of this instruction.
    pub const fn class(&self) -> InstrClass {
        classify(self.encoding)
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "core {}: 0x{:016x} (0x{:08x}) {}",
            self.core_id, self.address, self.encoding, self.mnemonic
        )?;
        if let Some(rd) = self.rd {
            write!(f, " x{rd} 0x{:016x}", self.rd_value)?;
        }
        if let Some(addr) = self.mem_addr {
            write!(f, " mem 0x{addr:016x}")?;
            if let Some(value) = self.mem_value {
                write!(f, " 0x{value:x}")?;
            }
        }
        Ok(())
    }
}

/// Ordered, forward-only sequence of reference instructions.
///
/// Entries are stored contiguously in program order; the successor of
/// entry `i` is entry `i + 1` and the last entry has none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceLog {
    entries: Vec<TraceEntry>,
}

/// Instruction mix of a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub instructions: usize,
    pub loads: usize,
    pub stores: usize,
    pub csr_reads: usize,
    pub writebacks: usize,
}

impl TraceLog {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TraceEntry> {
        self.entries.get(index)
    }

    /// Successor of the entry at `index`.
    pub fn next_of(&self, index: usize) -> Option<&TraceEntry> {
        self.entries.get(index + 1)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// True when the log ends in a terminal record.
    pub fn is_terminated(&self) -> bool {
        self.entries.last().is_some_and(|e| e.terminal)
    }

    pub fn summary(&self) -> TraceSummary {
        let mut summary = TraceSummary {
            instructions: self.entries.len(),
            ..TraceSummary::default()
        };
        for entry in &self.entries {
            match entry.class() {
                InstrClass::Load => summary.loads += 1,
                InstrClass::Store { .. } => summary.stores += 1,
                InstrClass::CsrRead { .. } => summary.csr_reads += 1,
                InstrClass::System | InstrClass::Other => {}
            }
            if entry.rd.is_some() {
                summary.writebacks += 1;
            }
        }
        summary
    }
}

impl From<Vec<TraceEntry>> for TraceLog {
    fn from(entries: Vec<TraceEntry>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a TraceLog {
    type Item = &'a TraceEntry;
    type IntoIter = std::slice::Iter<'a, TraceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
