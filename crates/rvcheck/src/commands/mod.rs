//! Command implementations.
//!
//! Each submodule handles one CLI command. Commands that touch the design
//! are generic over the register width and instantiated per `--xlen`.

mod check;
mod console;
mod trace;

use rvcheck::{Rv32, Rv64};

use crate::cli::{CheckArgs, Cli, Commands, XlenArg};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Check { .. } => handle_check(cli),
        Commands::Console { .. } => handle_console(cli),
        Commands::Trace { .. } => handle_trace(cli),
    }
}

fn handle_check(cli: &Cli) -> i32 {
    let Commands::Check {
        dut,
        trace,
        firmware,
        parse,
        fill_cycles,
        commit,
        commit_timeout,
        stop_on_first,
        no_csr_correction,
        csr_correction,
        no_pc_check,
        sim,
    } = &cli.command
    else {
        unreachable!("check command variant mismatch");
    };

    let check = CheckArgs {
        fill_cycles: *fill_cycles,
        commit: *commit,
        commit_timeout: *commit_timeout,
        stop_on_first: *stop_on_first,
        no_csr_correction: *no_csr_correction,
        csr_corrections: csr_correction.clone(),
        no_pc_check: *no_pc_check,
    };
    let options = rvcheck::CheckOptions {
        sim: sim.config(),
        max_wait: Some(sim.max_wait),
        check: check.config(),
        load: rvcheck::LoadOptions::default(),
    };

    match cli.xlen {
        XlenArg::Rv32 => check::cmd_check::<Rv32>(dut, trace, firmware, parse.config(), &options),
        XlenArg::Rv64 => check::cmd_check::<Rv64>(dut, trace, firmware, parse.config(), &options),
    }
}

fn handle_console(cli: &Cli) -> i32 {
    let Commands::Console {
        dut,
        firmware,
        reset_line,
        drain_polls,
        sim,
        ..
    } = &cli.command
    else {
        unreachable!("console command variant mismatch");
    };

    // clap makes `--dut` and `--hardware` mutually exclusive and requires one.
    match (dut, cli.xlen) {
        (Some(dut), XlenArg::Rv32) => {
            console::cmd_console_sim::<Rv32>(dut, firmware, sim, *drain_polls)
        }
        (Some(dut), XlenArg::Rv64) => {
            console::cmd_console_sim::<Rv64>(dut, firmware, sim, *drain_polls)
        }
        (None, XlenArg::Rv32) => {
            console::cmd_console_board::<Rv32>(reset_line, firmware, *drain_polls)
        }
        (None, XlenArg::Rv64) => {
            console::cmd_console_board::<Rv64>(reset_line, firmware, *drain_polls)
        }
    }
}

fn handle_trace(cli: &Cli) -> i32 {
    let Commands::Trace {
        log,
        parse,
        summary,
    } = &cli.command
    else {
        unreachable!("trace command variant mismatch");
    };

    trace::cmd_trace(log, parse.config(), *summary)
}
