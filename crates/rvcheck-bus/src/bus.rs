use crate::{BusError, Result};

/// Beat size of the instruction port, independent of XLEN.
pub const INSTR_GRANULE: usize = 4;

/// Validate a transfer before any signal is driven.
///
/// Returns the number of beats. Empty transfers are rejected first, then
/// transfers whose address or length is not a multiple of `granule`.
pub const fn check_transfer(addr: u64, len: usize, granule: usize) -> Result<usize> {
    if len == 0 {
        return Err(BusError::EmptyTransfer { addr });
    }
    if addr % granule as u64 != 0 || len % granule != 0 {
        return Err(BusError::Misaligned { addr, len, granule });
    }
    Ok(len / granule)
}

/// Round a byte count up to whole words.
pub const fn round_up_to_word(len: usize, word: usize) -> usize {
    len.div_ceil(word) * word
}

/// Word-granular access to the design's memories.
///
/// Addresses are offsets inside the port's window, never physical
/// addresses. Every call either completes all of its beats or fails before
/// the first one for argument errors.
pub trait Bus {
    /// Bytes per beat on the data port.
    fn word_bytes(&self) -> usize;

    /// Write to instruction memory in 32-bit beats.
    fn write_instr(&mut self, addr: u64, data: &[u8]) -> Result<()>;

    /// Write to the data port, one word per beat.
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()>;

    /// Read from the data port, one word per beat.
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Write a single data-port word.
    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        let bytes = value.to_le_bytes();
        let word = self.word_bytes();
        self.write(addr, &bytes[..word])
    }

    /// Read a single data-port word, zero-extended.
    fn read_word(&mut self, addr: u64) -> Result<u64> {
        let mut bytes = [0u8; 8];
        let word = self.word_bytes();
        self.read(addr, &mut bytes[..word])?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Set `len` bytes at `addr` to repeated copies of `value`, word by word.
    fn fill(&mut self, addr: u64, len: usize, value: u64) -> Result<()> {
        let word = self.word_bytes();
        let beats = check_transfer(addr, len, word)?;
        for beat in 0..beats {
            self.write_word(addr + (beat * word) as u64, value)?;
        }
        Ok(())
    }
}
