//! Memory-mapped hardware backend.
//!
//! On the FPGA the design's RAMs sit behind a fabric interface that the host
//! sees as physical memory. Each port gets its own `/dev/mem` mapping and
//! every beat is one volatile load or store.

use std::ffi::c_void;
use std::fs::OpenOptions;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, mmap_anonymous, munmap};
use rvcheck_isa::Xlen;
use tracing::{debug, warn};

use crate::{Bus, BusError, INSTR_GRANULE, Result, check_transfer};

/// A shared mapping of device memory.
pub struct MappedWindow {
    base: NonNull<c_void>,
    len: usize,
}

impl MappedWindow {
    /// Map `len` bytes of physical memory starting at `phys`.
    pub fn open_dev_mem(phys: u64, len: usize) -> Result<Self> {
        Self::open_device(Path::new("/dev/mem"), phys, len)
    }

    /// Map `len` bytes of `device` at offset `phys`, opened with `O_SYNC`.
    pub fn open_device(device: &Path, phys: u64, len: usize) -> Result<Self> {
        if phys % INSTR_GRANULE as u64 != 0 || len % INSTR_GRANULE != 0 {
            return Err(BusError::Misaligned {
                addr: phys,
                len,
                granule: INSTR_GRANULE,
            });
        }
        let size = NonZeroUsize::new(len).ok_or(BusError::EmptyTransfer { addr: phys })?;
        let offset = nix::libc::off_t::try_from(phys).map_err(|_| BusError::OutOfWindow {
            addr: phys,
            len,
            window: 0,
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_SYNC.bits())
            .open(device)?;

        let base = unsafe {
            mmap(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                offset,
            )?
        };
        debug!(
            device = %device.display(),
            phys = format!("{phys:#x}"),
            len = format!("{len:#x}"),
            "mapped device window"
        );
        Ok(Self { base, len })
    }

    /// Private zero-filled mapping, used where no device is present.
    pub fn anonymous(len: usize) -> Result<Self> {
        let size = NonZeroUsize::new(len).ok_or(BusError::EmptyTransfer { addr: 0 })?;
        let base = unsafe {
            mmap_anonymous(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
            )?
        };
        Ok(Self { base, len })
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_bounds(&self, offset: u64, len: usize) -> Result<usize> {
        let start = usize::try_from(offset).map_err(|_| BusError::OutOfWindow {
            addr: offset,
            len,
            window: self.len,
        })?;
        match start.checked_add(len) {
            Some(end) if end <= self.len => Ok(start),
            _ => Err(BusError::OutOfWindow {
                addr: offset,
                len,
                window: self.len,
            }),
        }
    }

    /// Store `data` word by word. Offsets and lengths are pre-validated.
    fn store(&self, offset: u64, data: &[u8], granule: usize) -> Result<()> {
        let start = self.check_bounds(offset, data.len())?;
        for (i, chunk) in data.chunks_exact(granule).enumerate() {
            let at = start + i * granule;
            unsafe {
                let ptr = self.base.as_ptr().cast::<u8>().add(at);
                if granule == 8 {
                    let mut word = [0u8; 8];
                    word.copy_from_slice(chunk);
                    ptr.cast::<u64>().write_volatile(u64::from_le_bytes(word));
                } else {
                    let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
                    ptr.cast::<u32>().write_volatile(u32::from_le_bytes(word));
                }
            }
        }
        Ok(())
    }

    fn load(&self, offset: u64, buf: &mut [u8], granule: usize) -> Result<()> {
        let start = self.check_bounds(offset, buf.len())?;
        for (i, chunk) in buf.chunks_exact_mut(granule).enumerate() {
            let at = start + i * granule;
            unsafe {
                let ptr = self.base.as_ptr().cast::<u8>().add(at);
                if granule == 8 {
                    chunk.copy_from_slice(&ptr.cast::<u64>().read_volatile().to_le_bytes());
                } else {
                    chunk.copy_from_slice(&ptr.cast::<u32>().read_volatile().to_le_bytes());
                }
            }
        }
        Ok(())
    }
}

impl Drop for MappedWindow {
    fn drop(&mut self) {
        if let Err(err) = unsafe { munmap(self.base, self.len) } {
            warn!(error = %err, "munmap failed");
        }
    }
}

// SAFETY: the mapping is exclusively owned and only accessed through &self
// methods that perform volatile word accesses.
unsafe impl Send for MappedWindow {}

/// Bus backend over mapped hardware windows.
///
/// A port without a window answers every call with [`BusError::NotMapped`].
pub struct MmioBus<X: Xlen> {
    instr: Option<MappedWindow>,
    data: Option<MappedWindow>,
    _xlen: PhantomData<X>,
}

impl<X: Xlen> Default for MmioBus<X> {
    fn default() -> Self {
        Self::unmapped()
    }
}

impl<X: Xlen> MmioBus<X> {
    pub const fn unmapped() -> Self {
        Self {
            instr: None,
            data: None,
            _xlen: PhantomData,
        }
    }

    pub const fn new(instr: MappedWindow, data: MappedWindow) -> Self {
        Self {
            instr: Some(instr),
            data: Some(data),
            _xlen: PhantomData,
        }
    }

    #[must_use]
    pub fn with_instr(mut self, window: MappedWindow) -> Self {
        self.instr = Some(window);
        self
    }

    #[must_use]
    pub fn with_data(mut self, window: MappedWindow) -> Self {
        self.data = Some(window);
        self
    }

    /// Release the instruction window.
    pub fn unmap_instr(&mut self) {
        self.instr = None;
    }

    /// Release the data window.
    pub fn unmap_data(&mut self) {
        self.data = None;
    }

    fn data_window(&self) -> Result<&MappedWindow> {
        self.data.as_ref().ok_or(BusError::NotMapped { port: "data" })
    }
}

impl<X: Xlen> Bus for MmioBus<X> {
    fn word_bytes(&self) -> usize {
        X::REG_BYTES
    }

    fn write_instr(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let window = self
            .instr
            .as_ref()
            .ok_or(BusError::NotMapped { port: "instr" })?;
        check_transfer(addr, data.len(), INSTR_GRANULE)?;
        window.store(addr, data, INSTR_GRANULE)
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let window = self.data_window()?;
        check_transfer(addr, data.len(), X::REG_BYTES)?;
        window.store(addr, data, X::REG_BYTES)
    }

    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let window = self.data_window()?;
        check_transfer(addr, buf.len(), X::REG_BYTES)?;
        window.load(addr, buf, X::REG_BYTES)
    }
}
