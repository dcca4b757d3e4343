//! Trace command.

use std::io::{self, Write};
use std::path::Path;

use rvcheck::{ParseConfig, session};
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Handle the `trace` command.
pub fn cmd_trace(log: &Path, parse: ParseConfig, summary_only: bool) -> i32 {
    let trace = match session::parse_trace(log, parse) {
        Ok(trace) => trace,
        Err(e) => {
            error!(error = %e, path = %log.display(), "failed to parse trace");
            return EXIT_FAILURE;
        }
    };

    if !summary_only {
        let mut out = io::stdout().lock();
        for entry in &trace {
            // Stop quietly when piped into `head`.
            if writeln!(out, "{entry}").is_err() {
                break;
            }
        }
    }

    let summary = trace.summary();
    terminal::header("Summary");
    terminal::indent(&format!("instructions: {}", summary.instructions));
    terminal::indent(&format!("loads:        {}", summary.loads));
    terminal::indent(&format!("stores:       {}", summary.stores));
    terminal::indent(&format!("csr reads:    {}", summary.csr_reads));
    terminal::indent(&format!("writebacks:   {}", summary.writebacks));
    if trace.is_terminated() {
        terminal::success("terminated by ebreak");
    } else {
        terminal::warning("no terminal record");
    }
    EXIT_SUCCESS
}
