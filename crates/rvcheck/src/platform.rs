//! The platform side of the design: bus access plus reset and pacing.
//!
//! Firmware loading and the console only need a [`Bus`] to move data, a
//! way to hold the core in reset while its RAMs are programmed, and a way
//! to let the core run between polls. In simulation all three go through
//! the same clocked model; on the board the reset is a sysfs line and time
//! passes on its own.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rvcheck_bus::{Bus, Clocked, MappedWindow, MmioBus, SimBus};
use rvcheck_isa::Xlen;
use rvcheck_mbox::map::{FIC0_BASE, FIC0_SIZE};
use tracing::debug;

use crate::dut::DutModel;
use crate::sim::Simulation;

/// Cycles the simulated core runs between two console polls.
pub const SIM_IDLE_CYCLES: u64 = 50;

/// sysfs line wired to the core reset on the reference board.
pub const BOARD_RESET_LINE: &str = "/sys/devices/platform/leds/leds/led1/brightness";

pub trait Platform: Bus {
    /// Keep the core from fetching.
    fn hold_core(&mut self) -> rvcheck_bus::Result<()>;

    /// Let the core start executing from its reset vector.
    fn release_core(&mut self) -> rvcheck_bus::Result<()>;

    /// Give the core time to make progress between polls.
    fn pause(&mut self) -> rvcheck_bus::Result<()>;
}

impl<D: DutModel, X: Xlen> Platform for SimBus<Simulation<D>, X> {
    fn hold_core(&mut self) -> rvcheck_bus::Result<()> {
        self.target_mut().hold_core();
        Ok(())
    }

    fn release_core(&mut self) -> rvcheck_bus::Result<()> {
        self.target_mut().release_core();
        Ok(())
    }

    fn pause(&mut self) -> rvcheck_bus::Result<()> {
        for _ in 0..SIM_IDLE_CYCLES {
            self.target_mut().cycle()?;
        }
        Ok(())
    }
}

/// Core running on the FPGA, reached through `/dev/mem`.
pub struct Board<X: Xlen> {
    bus: MmioBus<X>,
    reset_line: PathBuf,
    settle: Duration,
    poll: Duration,
}

impl<X: Xlen> Board<X> {
    pub const fn new(bus: MmioBus<X>, reset_line: PathBuf) -> Self {
        Self {
            bus,
            reset_line,
            settle: Duration::from_secs(1),
            poll: Duration::from_millis(10),
        }
    }

    /// Map both AXI windows of the fabric interface. `reset_line` is
    /// normally [`BOARD_RESET_LINE`].
    pub fn open(reset_line: impl Into<PathBuf>) -> rvcheck_bus::Result<Self> {
        let instr = MappedWindow::open_dev_mem(FIC0_BASE, FIC0_SIZE)?;
        let data = MappedWindow::open_dev_mem(FIC0_BASE, FIC0_SIZE)?;
        Ok(Self::new(MmioBus::new(instr, data), reset_line.into()))
    }

    #[must_use]
    pub const fn with_timing(mut self, settle: Duration, poll: Duration) -> Self {
        self.settle = settle;
        self.poll = poll;
        self
    }

    pub fn reset_line(&self) -> &Path {
        &self.reset_line
    }

    fn drive_reset(&self, level: &str) -> rvcheck_bus::Result<()> {
        fs::write(&self.reset_line, level)?;
        debug!(line = %self.reset_line.display(), level, "core reset driven");
        thread::sleep(self.settle);
        Ok(())
    }
}

impl<X: Xlen> Bus for Board<X> {
    fn word_bytes(&self) -> usize {
        self.bus.word_bytes()
    }

    fn write_instr(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
        self.bus.write_instr(addr, data)
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
        self.bus.write(addr, data)
    }

    fn read(&mut self, addr: u64, buf: &mut [u8]) -> rvcheck_bus::Result<()> {
        self.bus.read(addr, buf)
    }
}

impl<X: Xlen> Platform for Board<X> {
    fn hold_core(&mut self) -> rvcheck_bus::Result<()> {
        self.drive_reset("0")
    }

    fn release_core(&mut self) -> rvcheck_bus::Result<()> {
        self.drive_reset("1")
    }

    fn pause(&mut self) -> rvcheck_bus::Result<()> {
        thread::sleep(self.poll);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rvcheck_isa::Rv32;

    use super::*;

    fn board(line: &Path) -> Board<Rv32> {
        let bus = MmioBus::new(
            MappedWindow::anonymous(0x100).unwrap(),
            MappedWindow::anonymous(0x100).unwrap(),
        );
        Board::new(bus, line.to_path_buf()).with_timing(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_board_reset_line() {
        let line = tempfile::NamedTempFile::new().unwrap();
        let mut board = board(line.path());

        board.hold_core().unwrap();
        assert_eq!(fs::read_to_string(line.path()).unwrap(), "0");
        board.release_core().unwrap();
        assert_eq!(fs::read_to_string(line.path()).unwrap(), "1");
    }

    #[test]
    fn test_board_forwards_bus() {
        let line = tempfile::NamedTempFile::new().unwrap();
        let mut board = board(line.path());

        board.write_word(0x10, 0xDEAD_BEEF).unwrap();
        assert_eq!(board.read_word(0x10).unwrap(), 0xDEAD_BEEF);
        board.write_instr(0x0, &0x0010_0073u32.to_le_bytes()).unwrap();
    }

    #[test]
    fn test_missing_reset_line_is_io_error() {
        let mut board = board(Path::new("/nonexistent/dir/brightness"));
        let err = board.release_core().unwrap_err();
        assert!(matches!(err, rvcheck_bus::BusError::Io(_)));
    }
}
