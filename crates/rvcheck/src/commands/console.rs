//! Console command.

use std::io;
use std::path::Path;

use rvcheck::console::spawn_stdin_reader;
use rvcheck::platform::Platform;
use rvcheck::{Board, Console, ExitReason, LoadOptions, SharedLibDut, Xlen, session};
use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, SimArgs};
use crate::terminal;

/// Handle `console --dut`.
pub fn cmd_console_sim<X: Xlen>(
    dut_path: &Path,
    firmware: &Path,
    sim: &SimArgs,
    drain_polls: u64,
) -> i32 {
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

    let mut platform =
        match session::simulated_platform::<_, X>(dut, &sim.config(), Some(sim.max_wait)) {
            Ok(platform) => platform,
            Err(e) => {
                error!(error = %e, "failed to start simulation");
                return EXIT_FAILURE;
            }
        };
    relay::<_, X>(&mut platform, firmware, LoadOptions::default(), drain_polls)
}

/// Handle `console --hardware`.
pub fn cmd_console_board<X: Xlen>(reset_line: &Path, firmware: &Path, drain_polls: u64) -> i32 {
    let mut board = match Board::<X>::open(reset_line) {
        Ok(board) => board,
        Err(e) => {
            error!(error = %e, "failed to map the fabric interface (root required)");
            return EXIT_FAILURE;
        }
    };
    // Board RAMs keep their contents across a core reset.
    let load = LoadOptions {
        clear_memories: true,
    };
    relay::<_, X>(&mut board, firmware, load, drain_polls)
}

fn relay<P: Platform, X: Xlen>(
    platform: &mut P,
    firmware: &Path,
    load: LoadOptions,
    drain_polls: u64,
) -> i32 {
    let mut console = Console::<X>::new().with_drain_polls(drain_polls);
    let input = spawn_stdin_reader();
    terminal::info("console attached, type `q` to quit");

    let mut stdout = io::stdout().lock();
    match session::console(platform, firmware, load, &mut console, &input, &mut stdout) {
        Ok(reason) => {
            let stats = console.stats();
            info!(
                sent = stats.sent,
                received = stats.received,
                polls = stats.polls,
                "console detached"
            );
            if reason == ExitReason::InputClosed {
                terminal::info("input closed");
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "console failed");
            EXIT_FAILURE
        }
    }
}
