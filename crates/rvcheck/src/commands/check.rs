//! Check command.

use std::path::Path;

use rvcheck::{CheckOptions, ParseConfig, SharedLibDut, Verdict, Xlen, session};
use tracing::{error, warn};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Spinner};

/// Handle the `check` command.
pub fn cmd_check<X: Xlen>(
    dut_path: &Path,
    trace_path: &Path,
    firmware: &Path,
    parse: ParseConfig,
    options: &CheckOptions,
) -> i32 {
    let trace = match session::parse_trace(trace_path, parse) {
        Ok(trace) => trace,
        Err(e) => {
            error!(error = %e, path = %trace_path.display(), "failed to parse trace");
            return EXIT_FAILURE;
        }
    };
    if trace.is_empty() {
        warn!(path = %trace_path.display(), "trace has no instructions above the user base");
    }

    let dut = match SharedLibDut::open(dut_path) {
        Ok(dut) => dut,
        Err(e) => {
            error!(error = %e, path = %dut_path.display(), "failed to load model");
            return EXIT_FAILURE;
        }
    };
    if let Err(e) = dut.check_xlen(X::VALUE) {
        error!(error = %e, "model does not match --xlen");
        return EXIT_FAILURE;
    }
    let mut options = options.clone();
    if options.sim.waveform.is_some() && !dut.supports_waveform() {
        warn!("model has no waveform support, ignoring --waveform");
        options.sim.waveform = None;
    }

    let spinner = Spinner::new(format!(
        "checking {} reference instructions (RV{})",
        trace.len(),
        X::VALUE
    ));
    let report = match session::check::<_, X>(dut, &trace, firmware, &options) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_with_failure("co-simulation did not start");
            error!(error = %e, "check failed");
            return EXIT_FAILURE;
        }
    };

    let stats = format!(
        "{} instructions, {} cycles",
        report.instructions, report.cycles
    );
    match report.verdict() {
        Verdict::Success => spinner.finish_with_success(&format!("{} ({stats})", Verdict::Success)),
        Verdict::Failure => {
            spinner.finish_with_failure(&format!(
                "{} ({stats}, {} mismatches)",
                Verdict::Failure,
                report.mismatches.len()
            ));
            if let Some(first) = report.first_mismatch() {
                terminal::indent(&format!("first: {first}"));
            }
            if let Some(abort) = report.aborted {
                terminal::warning(&format!("run ended early: {abort}"));
            }
        }
    }
    println!("{}", report.verdict());

    match report.verdict() {
        Verdict::Success => EXIT_SUCCESS,
        Verdict::Failure => EXIT_FAILURE,
    }
}
