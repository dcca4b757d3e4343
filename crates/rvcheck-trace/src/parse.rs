use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::{Result, TraceEntry, TraceError, TraceLog};

/// Default first address of the program under test. Everything below it is
/// the golden simulator's boot ROM.
pub const DEFAULT_USER_BASE: u64 = 0x8000_0000;

/// Parser settings.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Records fetched below this address are dropped.
    pub user_base: u64,
    /// Mnemonic prefix that ends the program (case-sensitive).
    pub terminal_token: String,
    /// Maximum bytes of disassembly kept per record.
    pub mnemonic_capacity: usize,
    /// Lines containing any of these markers are instrumentation noise.
    pub noise_markers: Vec<String>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            user_base: DEFAULT_USER_BASE,
            terminal_token: "ebreak".to_string(),
            mnemonic_capacity: 32,
            noise_markers: vec![
                "debug".to_string(),
                ">>>>".to_string(),
                "warning:".to_string(),
            ],
        }
    }
}

/// Counters describing what the parser saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Lines read.
    pub lines: usize,
    /// Blank, comment, noise and malformed lines.
    pub skipped: usize,
    /// Records dropped for being below `user_base`.
    pub filtered: usize,
    /// Records whose commit line never appeared.
    pub missing_commit: usize,
    /// The input ended between a fetch line and its commit line.
    pub truncated: bool,
}

/// Fields of a fetch line.
struct Fetch {
    core_id: u8,
    address: u64,
    encoding: u32,
    mnemonic: String,
}

/// Effects from a commit line.
#[derive(Default)]
struct Effects {
    rd: Option<u8>,
    rd_value: u64,
    mem_addr: Option<u64>,
    mem_value: Option<u64>,
}

/// Spike commit-log parser.
#[derive(Debug, Clone, Default)]
pub struct TraceParser {
    config: ParseConfig,
    stats: ParseStats,
}

impl TraceParser {
    pub const fn new(config: ParseConfig) -> Self {
        Self {
            config,
            stats: ParseStats {
                lines: 0,
                skipped: 0,
                filtered: 0,
                missing_commit: 0,
                truncated: false,
            },
        }
    }

    /// Statistics of the last parse.
    pub const fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Parse a log file. Files ending in `.zst` are decompressed on the fly.
    pub fn parse_file(&mut self, path: &Path) -> Result<TraceLog> {
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "parsing reference trace");

        let compressed = path.extension().is_some_and(|ext| ext == "zst");
        let reader: Box<dyn Read> = if compressed {
            Box::new(zstd::stream::Decoder::new(file)?)
        } else {
            Box::new(file)
        };
        self.parse_reader(BufReader::new(reader))
    }

    /// Parse a log from any buffered reader.
    ///
    /// Ingestion stops after the first terminal record. A fetch line left
    /// without its commit line at end of input is discarded; everything
    /// before it is kept.
    pub fn parse_reader<R: BufRead>(&mut self, reader: R) -> Result<TraceLog> {
        self.stats = ParseStats::default();
        let mut log = TraceLog::new();
        let mut lines = reader.split(b'\n');
        let mut pending: Option<String> = None;

        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => match lines.next() {
                    Some(raw) => self.decode(&raw?),
                    None => break,
                },
            };

            let Some(fetch) = self.parse_fetch(&line) else {
                self.skip(&line);
                continue;
            };

            let terminal = fetch.mnemonic.starts_with(&self.config.terminal_token);
            let effects = if terminal {
                Effects::default()
            } else {
                // Find the commit line, tolerating noise in between.
                let mut found = None;
                for raw in lines.by_ref() {
                    let next = self.decode(&raw?);
                    if self.is_noise(&next) {
                        self.skip(&next);
                    } else if self.parse_fetch(&next).is_some() {
                        self.stats.missing_commit += 1;
                        pending = Some(next);
                        found = Some(Effects::default());
                        break;
                    } else if let Some(effects) = parse_commit(&next) {
                        found = Some(effects);
                        break;
                    } else {
                        self.skip(&next);
                    }
                }
                let Some(effects) = found else {
                    warn!(
                        address = format!("{:#x}", fetch.address),
                        "trace ends inside a record, dropping it"
                    );
                    self.stats.truncated = true;
                    break;
                };
                effects
            };

            if fetch.address < self.config.user_base {
                self.stats.filtered += 1;
                continue;
            }

            log.push(TraceEntry {
                core_id: fetch.core_id,
                address: fetch.address,
                encoding: fetch.encoding,
                mnemonic: fetch.mnemonic,
                rd: effects.rd,
                rd_value: effects.rd_value,
                mem_addr: effects.mem_addr,
                mem_value: effects.mem_value,
                terminal,
            });

            if terminal {
                break;
            }
        }

        debug!(
            entries = log.len(),
            lines = self.stats.lines,
            skipped = self.stats.skipped,
            filtered = self.stats.filtered,
            "parsed reference trace"
        );
        Ok(log)
    }

    fn decode(&mut self, raw: &[u8]) -> String {
        self.stats.lines += 1;
        String::from_utf8_lossy(raw).trim_end().to_string()
    }

    fn skip(&mut self, line: &str) {
        self.stats.skipped += 1;
        trace!(line, "skipping trace line");
    }

    fn is_noise(&self, line: &str) -> bool {
        let line = line.trim();
        line.is_empty()
            || line.starts_with('#')
            || line.starts_with("//")
            || self
                .config
                .noise_markers
                .iter()
                .any(|marker| line.contains(marker.as_str()))
    }

    /// Parse `core <id>: 0x<addr> (0x<enc>) <mnemonic>`.
    fn parse_fetch(&self, line: &str) -> Option<Fetch> {
        if self.is_noise(line) {
            return None;
        }
        let pattern = FETCH_PATTERN.get_or_init(|| {
            Regex::new(
                r"^\s*(?:core\s+)?(\d+):?\s+(?:0x)?([0-9a-fA-F]+)\s+\((?:0x)?([0-9a-fA-F]+)\)\s*(.*)$",
            )
            .unwrap()
        });
        let caps = pattern.captures(line)?;

        let core_id = caps.get(1)?.as_str().parse::<u8>().ok()?;
        let address = u64::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
        let encoding = u32::from_str_radix(caps.get(3)?.as_str(), 16).ok()?;
        let mnemonic = truncate(caps.get(4)?.as_str().trim(), self.config.mnemonic_capacity);

        Some(Fetch {
            core_id,
            address,
            encoding,
            mnemonic,
        })
    }
}

/// Parse the effects after the closing parenthesis of a commit line:
/// `[x<rd> 0x<value>] [mem 0x<addr> [0x<data>]]`.
fn parse_commit(line: &str) -> Option<Effects> {
    let (_, rest) = line.split_once(')')?;
    let mut effects = Effects::default();

    let reg_pattern = REG_PATTERN
        .get_or_init(|| Regex::new(r"\bx(\d+)\s+(?:0x)?([0-9a-fA-F]+)").unwrap());
    if let Some(caps) = reg_pattern.captures(rest) {
        let reg = caps.get(1)?.as_str().parse::<u8>().ok()?;
        let value = u64::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
        // x0 is hardwired; a logged write to it carries no state.
        if reg != 0 && reg < 32 {
            effects.rd = Some(reg);
            effects.rd_value = value;
        }
    }

    let mem_pattern = MEM_PATTERN.get_or_init(|| {
        Regex::new(r"\bmem\s+(?:0x)?([0-9a-fA-F]+)(?:\s+(?:0x)?([0-9a-fA-F]+))?").unwrap()
    });
    if let Some(caps) = mem_pattern.captures(rest) {
        effects.mem_addr = Some(u64::from_str_radix(caps.get(1)?.as_str(), 16).ok()?);
        effects.mem_value = caps
            .get(2)
            .and_then(|m| u64::from_str_radix(m.as_str(), 16).ok());
    }

    Some(effects)
}

fn truncate(text: &str, capacity: usize) -> String {
    if text.len() <= capacity {
        return text.to_string();
    }
    let mut end = capacity;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

static FETCH_PATTERN: OnceLock<Regex> = OnceLock::new();
static REG_PATTERN: OnceLock<Regex> = OnceLock::new();
static MEM_PATTERN: OnceLock<Regex> = OnceLock::new();
