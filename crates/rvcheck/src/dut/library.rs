//! Hardware models compiled to a shared library.
//!
//! The library wraps a generated RTL model behind a small C ABI. Every call
//! takes the opaque handle returned by `rvcheck_dut_new`.

use std::ffi::{CString, c_char, c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::os::unix::{Library, RTLD_NOW, Symbol};
use thiserror::Error;
use tracing::{debug, error, trace};

use super::{DutModel, Memory, Signal};

pub type DutNew = unsafe extern "C" fn() -> *mut c_void;
pub type DutFree = unsafe extern "C" fn(*mut c_void);
pub type DutEval = unsafe extern "C" fn(*mut c_void);
pub type DutSetClock = unsafe extern "C" fn(*mut c_void, u8);
pub type DutPeek = unsafe extern "C" fn(*mut c_void, u32) -> u64;
pub type DutPoke = unsafe extern "C" fn(*mut c_void, u32, u64);
pub type DutPeekMem = unsafe extern "C" fn(*mut c_void, u32, u64) -> u64;
pub type DutPokeMem = unsafe extern "C" fn(*mut c_void, u32, u64, u64);
pub type DutTraceOpen = unsafe extern "C" fn(*mut c_void, *const c_char) -> c_int;
pub type DutTraceDump = unsafe extern "C" fn(*mut c_void, u64);
pub type DutTraceClose = unsafe extern "C" fn(*mut c_void);

#[derive(Debug, Error)]
pub enum DutError {
    #[error("failed to load model library: {0}")]
    Load(#[from] libloading::Error),

    #[error("model library not found: {0}")]
    LibraryNotFound(PathBuf),

    #[error("failed to find symbol '{0}': {1}")]
    SymbolNotFound(String, libloading::Error),

    #[error("model constructor returned null")]
    CreateFailed,

    #[error("model was built for RV{actual}, expected RV{expected}")]
    XlenMismatch { expected: u8, actual: u32 },

    #[error("model does not support waveform tracing (requested {0})")]
    WaveformUnsupported(PathBuf),

    #[error("failed to open waveform {0}")]
    WaveformOpen(PathBuf),
}

/// Optional waveform entry points.
#[derive(Clone, Copy)]
pub struct WaveformApi {
    pub open: DutTraceOpen,
    pub dump: DutTraceDump,
    pub close: DutTraceClose,
}

/// Entry points resolved from a model library.
#[derive(Clone, Copy)]
pub struct DutApi {
    pub new: DutNew,
    pub free: DutFree,
    pub eval: DutEval,
    pub set_clock: DutSetClock,
    pub peek: DutPeek,
    pub poke: DutPoke,
    pub peek_mem: DutPeekMem,
    pub poke_mem: DutPokeMem,
    pub waveform: Option<WaveformApi>,
    /// `RVCHECK_DUT_XLEN`, when the library exports it.
    pub xlen: Option<u32>,
}

impl DutApi {
    pub unsafe fn load(lib: &Library) -> Result<Self, DutError> {
        unsafe {
            let waveform = match (
                load_optional::<DutTraceOpen>(lib, b"rvcheck_dut_trace_open"),
                load_optional::<DutTraceDump>(lib, b"rvcheck_dut_trace_dump"),
                load_optional::<DutTraceClose>(lib, b"rvcheck_dut_trace_close"),
            ) {
                (Some(open), Some(dump), Some(close)) => Some(WaveformApi { open, dump, close }),
                _ => None,
            };

            Ok(Self {
                new: load_symbol(lib, b"rvcheck_dut_new", "rvcheck_dut_new")?,
                free: load_symbol(lib, b"rvcheck_dut_free", "rvcheck_dut_free")?,
                eval: load_symbol(lib, b"rvcheck_dut_eval", "rvcheck_dut_eval")?,
                set_clock: load_symbol(lib, b"rvcheck_dut_set_clock", "rvcheck_dut_set_clock")?,
                peek: load_symbol(lib, b"rvcheck_dut_peek", "rvcheck_dut_peek")?,
                poke: load_symbol(lib, b"rvcheck_dut_poke", "rvcheck_dut_poke")?,
                peek_mem: load_symbol(lib, b"rvcheck_dut_peek_mem", "rvcheck_dut_peek_mem")?,
                poke_mem: load_symbol(lib, b"rvcheck_dut_poke_mem", "rvcheck_dut_poke_mem")?,
                waveform,
                xlen: load_data_symbol(lib, b"RVCHECK_DUT_XLEN"),
            })
        }
    }
}

unsafe fn load_symbol<T: Copy>(
    lib: &Library,
    symbol: &'static [u8],
    label: &'static str,
) -> Result<T, DutError> {
    unsafe {
        let sym: Symbol<T> = lib.get(symbol).map_err(|e| {
            error!(symbol = label, "symbol not found in model library");
            DutError::SymbolNotFound(label.to_string(), e)
        })?;
        Ok(*sym)
    }
}

unsafe fn load_optional<T: Copy>(lib: &Library, symbol: &'static [u8]) -> Option<T> {
    unsafe {
        let sym: Symbol<T> = lib.get(symbol).ok()?;
        Some(*sym)
    }
}

unsafe fn load_data_symbol(lib: &Library, symbol: &'static [u8]) -> Option<u32> {
    unsafe {
        let sym: Symbol<*const u32> = lib.get(symbol).ok()?;
        Some(**sym)
    }
}

/// A model instance living in a dynamically loaded library.
pub struct SharedLibDut {
    handle: NonNull<c_void>,
    api: DutApi,
    waveform_open: bool,
    _lib: Library,
}

impl SharedLibDut {
    /// Load the library at `path` and create one model instance.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DutError> {
        let path = path.as_ref();
        if !path.exists() {
            error!(path = %path.display(), "model library not found");
            return Err(DutError::LibraryNotFound(path.to_path_buf()));
        }

        debug!(path = %path.display(), "loading model library");
        let lib = unsafe { Library::open(Some(path), RTLD_NOW)? };
        let api = unsafe { DutApi::load(&lib)? };
        let handle = NonNull::new(unsafe { (api.new)() }).ok_or(DutError::CreateFailed)?;

        trace!(
            xlen = ?api.xlen,
            waveform = api.waveform.is_some(),
            "model instance created"
        );
        Ok(Self {
            handle,
            api,
            waveform_open: false,
            _lib: lib,
        })
    }

    /// Fail if the library declares a register width other than `expected`.
    pub fn check_xlen(&self, expected: u8) -> Result<(), DutError> {
        match self.api.xlen {
            Some(actual) if actual != u32::from(expected) => {
                Err(DutError::XlenMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    pub const fn supports_waveform(&self) -> bool {
        self.api.waveform.is_some()
    }
}

impl DutModel for SharedLibDut {
    fn eval(&mut self) {
        unsafe { (self.api.eval)(self.handle.as_ptr()) }
    }

    fn set_clock(&mut self, high: bool) {
        unsafe { (self.api.set_clock)(self.handle.as_ptr(), u8::from(high)) }
    }

    fn peek(&self, signal: Signal) -> u64 {
        unsafe { (self.api.peek)(self.handle.as_ptr(), signal.id()) }
    }

    fn poke(&mut self, signal: Signal, value: u64) {
        unsafe { (self.api.poke)(self.handle.as_ptr(), signal.id(), value) }
    }

    fn peek_mem(&self, memory: Memory, index: u64) -> u64 {
        unsafe { (self.api.peek_mem)(self.handle.as_ptr(), memory as u32, index) }
    }

    fn poke_mem(&mut self, memory: Memory, index: u64, value: u64) {
        unsafe { (self.api.poke_mem)(self.handle.as_ptr(), memory as u32, index, value) }
    }

    fn open_waveform(&mut self, path: &Path) -> Result<(), DutError> {
        let Some(waveform) = self.api.waveform else {
            return Err(DutError::WaveformUnsupported(path.to_path_buf()));
        };
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| DutError::WaveformOpen(path.to_path_buf()))?;
        let rc = unsafe { (waveform.open)(self.handle.as_ptr(), c_path.as_ptr()) };
        if rc != 0 {
            return Err(DutError::WaveformOpen(path.to_path_buf()));
        }
        debug!(path = %path.display(), "waveform opened");
        self.waveform_open = true;
        Ok(())
    }

    fn dump_waveform(&mut self, time: u64) {
        if let (true, Some(waveform)) = (self.waveform_open, self.api.waveform) {
            unsafe { (waveform.dump)(self.handle.as_ptr(), time) }
        }
    }
}

impl Drop for SharedLibDut {
    fn drop(&mut self) {
        unsafe {
            if let (true, Some(waveform)) = (self.waveform_open, self.api.waveform) {
                (waveform.close)(self.handle.as_ptr());
            }
            (self.api.free)(self.handle.as_ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let err = SharedLibDut::open("/nonexistent/libdut.so")
            .err()
            .expect("open should fail");
        assert!(matches!(err, DutError::LibraryNotFound(_)));
    }

    #[test]
    fn test_not_a_library() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not an ELF").unwrap();
        let err = SharedLibDut::open(file.path()).err().expect("open should fail");
        assert!(matches!(err, DutError::Load(_)));
    }
}
