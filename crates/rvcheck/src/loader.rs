//! Firmware images and programming them into the design's RAMs.
//!
//! An image is text, one word per line:
//!
//! ```text
//! # comment
//! 80000000:00000297
//! 80010000:deadbeef
//! ```
//!
//! Addresses are absolute (as linked for the core) and get normalized to
//! the fabric window before being routed to instruction or data RAM.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rvcheck_bus::BusError;
use rvcheck_mbox::map::{DATA_RAM, INSTR_RAM, Region, normalize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read firmware {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to drive core reset: {0}")]
    Reset(#[source] BusError),
}

/// One `addr:data` line of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageWord {
    /// 1-based line number in the source.
    pub line: usize,
    pub addr: u64,
    pub data: u64,
}

/// Why a line was not programmed.
#[derive(Debug)]
pub enum FaultKind {
    Syntax(String),
    /// Normalized address outside both RAMs.
    OutOfRange { offset: u64 },
    Bus(BusError),
}

#[derive(Debug)]
pub struct LoadFault {
    pub line: usize,
    pub kind: FaultKind,
}

impl fmt::Display for LoadFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FaultKind::Syntax(text) => write!(f, "line {}: cannot parse `{text}`", self.line),
            FaultKind::OutOfRange { offset } => {
                write!(f, "line {}: offset {offset:#x} is outside RAM", self.line)
            }
            FaultKind::Bus(err) => {
                write!(f, "line {}: write failed (code {}): {err}", self.line, err.code())
            }
        }
    }
}

/// A parsed firmware image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareImage {
    pub words: Vec<ImageWord>,
}

impl FirmwareImage {
    /// Parse image text. Lines that do not parse are returned as faults.
    pub fn parse(text: &str) -> (Self, Vec<LoadFault>) {
        let mut words = Vec::new();
        let mut faults = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            match parse_word(line) {
                Some((addr, data)) => words.push(ImageWord {
                    line: i + 1,
                    addr,
                    data,
                }),
                None => faults.push(LoadFault {
                    line: i + 1,
                    kind: FaultKind::Syntax(line.to_string()),
                }),
            }
        }
        (Self { words }, faults)
    }

    pub fn read(path: &Path) -> Result<(Self, Vec<LoadFault>), LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }
}

fn parse_hex(field: &str) -> Option<u64> {
    let field = field.trim();
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_word(line: &str) -> Option<(u64, u64)> {
    let (addr, data) = line.split_once(':')?;
    Some((parse_hex(addr)?, parse_hex(data)?))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Zero both RAMs before programming. Simulated RAMs come out of reset
    /// cleared, the board's do not.
    pub clear_memories: bool,
}

/// Outcome of programming an image.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub instr_words: usize,
    pub data_words: usize,
    pub faults: Vec<LoadFault>,
    /// The core was let out of reset.
    pub released: bool,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Read and program the image at `path`.
pub fn load_firmware<P: Platform + ?Sized>(
    platform: &mut P,
    path: &Path,
    options: LoadOptions,
) -> Result<LoadReport, LoadError> {
    let (image, faults) = FirmwareImage::read(path)?;
    info!(path = %path.display(), words = image.words.len(), "loading firmware");
    load_image(platform, &image, faults, options)
}

/// Program `image` with the core held in reset.
///
/// Every word is attempted; failures are collected. The core is released
/// only when the image parsed and programmed without a single fault.
pub fn load_image<P: Platform + ?Sized>(
    platform: &mut P,
    image: &FirmwareImage,
    mut faults: Vec<LoadFault>,
    options: LoadOptions,
) -> Result<LoadReport, LoadError> {
    platform.hold_core().map_err(LoadError::Reset)?;
    if options.clear_memories {
        clear(platform);
    }

    let mut report = LoadReport::default();
    for word in &image.words {
        let offset = normalize(word.addr);
        let result = if INSTR_RAM.contains(offset, 4) {
            let bits = (word.data as u32).to_le_bytes();
            platform.write_instr(offset, &bits).map(|()| report.instr_words += 1)
        } else if DATA_RAM.contains(offset, platform.word_bytes()) {
            platform
                .write_word(offset, word.data)
                .map(|()| report.data_words += 1)
        } else {
            faults.push(LoadFault {
                line: word.line,
                kind: FaultKind::OutOfRange { offset },
            });
            continue;
        };
        if let Err(err) = result {
            faults.push(LoadFault {
                line: word.line,
                kind: FaultKind::Bus(err),
            });
        }
    }

    faults.sort_by_key(|f| f.line);
    for fault in &faults {
        warn!("{fault}");
    }
    report.faults = faults;
    metrics::record_firmware("instr", report.instr_words as u64);
    metrics::record_firmware("data", report.data_words as u64);

    if report.is_clean() {
        platform.release_core().map_err(LoadError::Reset)?;
        report.released = true;
    }
    info!(
        instr = report.instr_words,
        data = report.data_words,
        errors = report.faults.len(),
        "firmware loaded"
    );
    Ok(report)
}

fn clear<P: Platform + ?Sized>(platform: &mut P) {
    if let Err(err) = clear_instr(platform, INSTR_RAM) {
        warn!(error = %err, "failed to clear instruction RAM");
    }
    if let Err(err) = platform.fill(DATA_RAM.base, DATA_RAM.size, 0) {
        warn!(error = %err, "failed to clear data RAM");
    }
    debug!("RAMs cleared");
}

fn clear_instr<P: Platform + ?Sized>(platform: &mut P, region: Region) -> rvcheck_bus::Result<()> {
    for offset in (region.base..region.end()).step_by(4) {
        platform.write_instr(offset, &[0; 4])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rvcheck_bus::{Bus, check_transfer};

    use super::*;

    #[derive(Default)]
    struct FakePlatform {
        instr: BTreeMap<u64, u32>,
        data: BTreeMap<u64, u64>,
        in_reset: bool,
        releases: usize,
        data_writes: usize,
    }

    impl Bus for FakePlatform {
        fn word_bytes(&self) -> usize {
            4
        }

        fn write_instr(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
            check_transfer(addr, data.len(), 4)?;
            for (i, chunk) in data.chunks_exact(4).enumerate() {
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                self.instr.insert(addr + 4 * i as u64, word);
            }
            Ok(())
        }

        fn write(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
            check_transfer(addr, data.len(), 4)?;
            for (i, chunk) in data.chunks_exact(4).enumerate() {
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                self.data.insert(addr + 4 * i as u64, word.into());
                self.data_writes += 1;
            }
            Ok(())
        }

        fn read(&mut self, addr: u64, buf: &mut [u8]) -> rvcheck_bus::Result<()> {
            check_transfer(addr, buf.len(), 4)?;
            for (i, chunk) in buf.chunks_exact_mut(4).enumerate() {
                let word = self.data.get(&(addr + 4 * i as u64)).copied().unwrap_or(0);
                chunk.copy_from_slice(&(word as u32).to_le_bytes());
            }
            Ok(())
        }
    }

    impl Platform for FakePlatform {
        fn hold_core(&mut self) -> rvcheck_bus::Result<()> {
            self.in_reset = true;
            Ok(())
        }

        fn release_core(&mut self) -> rvcheck_bus::Result<()> {
            self.in_reset = false;
            self.releases += 1;
            Ok(())
        }

        fn pause(&mut self) -> rvcheck_bus::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "# header\n\n// note\n80000000:00000297\n  0x80010000 : 0xdeadbeef  \n";
        let (image, faults) = FirmwareImage::parse(text);
        assert!(faults.is_empty());
        assert_eq!(
            image.words,
            vec![
                ImageWord {
                    line: 4,
                    addr: 0x8000_0000,
                    data: 0x297
                },
                ImageWord {
                    line: 5,
                    addr: 0x8001_0000,
                    data: 0xdead_beef
                },
            ]
        );
    }

    #[test]
    fn test_parse_reports_bad_lines() {
        let (image, faults) = FirmwareImage::parse("80000000:13\nnot a word\n80000004:zz\n");
        assert_eq!(image.words.len(), 1);
        let lines: Vec<usize> = faults.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert!(matches!(faults[0].kind, FaultKind::Syntax(_)));
    }

    #[test]
    fn test_routes_words_to_rams_and_releases_core() {
        let (image, faults) =
            FirmwareImage::parse("80000000:00000297\n80000004:00100073\n80010008:cafef00d\n");
        let mut platform = FakePlatform::default();

        let report = load_image(&mut platform, &image, faults, LoadOptions::default()).unwrap();
        assert!(report.is_clean());
        assert!(report.released);
        assert_eq!((report.instr_words, report.data_words), (2, 1));
        assert_eq!(platform.instr.get(&0x4), Some(&0x0010_0073));
        assert_eq!(platform.data.get(&0x1_0008), Some(&0xcafe_f00d));
        assert!(!platform.in_reset);
    }

    #[test]
    fn test_out_of_range_keeps_core_in_reset() {
        let (image, faults) = FirmwareImage::parse("80000000:13\n80020000:1\n80000004:13\n");
        let mut platform = FakePlatform::default();

        let report = load_image(&mut platform, &image, faults, LoadOptions::default()).unwrap();
        assert!(!report.released);
        assert_eq!(platform.releases, 0);
        assert!(platform.in_reset);
        // The remaining words were still programmed.
        assert_eq!(report.instr_words, 2);
        assert_eq!(report.faults.len(), 1);
        assert!(matches!(
            report.faults[0].kind,
            FaultKind::OutOfRange { offset: 0x2_0000 }
        ));
    }

    #[test]
    fn test_misaligned_data_word_is_a_bus_fault() {
        let (image, faults) = FirmwareImage::parse("80010002:ff\n");
        let mut platform = FakePlatform::default();

        let report = load_image(&mut platform, &image, faults, LoadOptions::default()).unwrap();
        assert!(!report.released);
        match &report.faults[0].kind {
            FaultKind::Bus(err) => assert_eq!(err.code(), rvcheck_bus::status::ADDR_NOT_ALIGNED),
            other => panic!("unexpected fault {other:?}"),
        }
        assert!(platform.data.is_empty());
    }

    #[test]
    fn test_syntax_fault_blocks_release() {
        let (image, faults) = FirmwareImage::parse("garbage\n80000000:13\n");
        let mut platform = FakePlatform::default();

        let report = load_image(&mut platform, &image, faults, LoadOptions::default()).unwrap();
        assert_eq!(report.instr_words, 1);
        assert!(!report.released);
    }

    #[test]
    fn test_clear_memories_first() {
        let mut platform = FakePlatform::default();
        let options = LoadOptions {
            clear_memories: true,
        };

        load_image(&mut platform, &FirmwareImage::default(), Vec::new(), options).unwrap();
        assert_eq!(platform.instr.len(), INSTR_RAM.size / 4);
        assert_eq!(platform.data_writes, DATA_RAM.size / 4);
        assert!(platform.data.values().all(|&w| w == 0));
    }

    #[test]
    fn test_load_firmware_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "80000000:00100073\n").unwrap();
        let mut platform = FakePlatform::default();

        let report = load_firmware(&mut platform, file.path(), LoadOptions::default()).unwrap();
        assert_eq!(report.instr_words, 1);
        assert!(report.released);
    }

    #[test]
    fn test_missing_image() {
        let mut platform = FakePlatform::default();
        let err = load_firmware(
            &mut platform,
            Path::new("/nonexistent/fw.hex"),
            LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }
}
