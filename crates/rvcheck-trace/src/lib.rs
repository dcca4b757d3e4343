//! Reference trace ingestion.
//!
//! A reference trace is the commit log of a golden simulator (Spike with
//! `--log-commits`). Each retired instruction takes two lines: a fetch line
//! with address, encoding and disassembly, and a commit line with the
//! register and memory effects. [`TraceParser`] turns such a log into a
//! [`TraceLog`], an ordered arena of [`TraceEntry`] values that the
//! comparator walks front to back.

mod entry;
mod parse;

pub use entry::{TraceEntry, TraceLog, TraceSummary};
pub use parse::{ParseConfig, ParseStats, TraceParser};

use std::path::PathBuf;

use thiserror::Error;

/// Trace ingestion errors.
///
/// Malformed lines are not errors; they are skipped and counted in
/// [`ParseStats`].
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to open trace {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error while reading trace: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TraceError>;
