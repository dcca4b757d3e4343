//! Interactive console relay over the mailbox.
//!
//! Lines typed by the user go to the core on PTC; messages the core
//! publishes on CTP are written to the output. The relay never blocks on
//! input: lines arrive through a channel fed by a reader thread and are
//! queued until the PTC slot is free.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use rvcheck_isa::Xlen;
use rvcheck_mbox::{Endpoint, MailboxError};
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics;
use crate::platform::Platform;

/// Line that ends the session.
pub const QUIT_COMMAND: &str = "q";

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error(transparent)]
    Bus(#[from] rvcheck_bus::BusError),

    #[error("failed to write console output: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub sent: usize,
    pub received: usize,
    pub polls: u64,
}

/// Why the relay loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    InputClosed,
}

/// Platform end of the console.
pub struct Console<X: Xlen> {
    endpoint: Endpoint<X>,
    queued: VecDeque<Vec<u8>>,
    drain_polls: u64,
    stats: RelayStats,
}

impl<X: Xlen> Default for Console<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: Xlen> Console<X> {
    pub const fn new() -> Self {
        Self {
            endpoint: Endpoint::platform(),
            queued: VecDeque::new(),
            drain_polls: 1,
            stats: RelayStats {
                sent: 0,
                received: 0,
                polls: 0,
            },
        }
    }

    /// Quiet polls to wait for late core output once the input has closed.
    #[must_use]
    pub const fn with_drain_polls(mut self, polls: u64) -> Self {
        self.drain_polls = polls;
        self
    }

    pub const fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Clear both mailbox channels. Must run before the core is released.
    pub fn reset<P: Platform + ?Sized>(&mut self, platform: &mut P) -> Result<(), ConsoleError> {
        self.endpoint.reset(platform)?;
        self.queued.clear();
        Ok(())
    }

    /// Relay until the user quits or the input closes.
    ///
    /// Each poll takes every line typed since the last one, prints at most
    /// one core message, publishes the oldest queued line if PTC is free
    /// and then lets the core run. After the input closes, queued lines are
    /// still delivered and the loop ends once the core has been quiet for
    /// more than the drain budget.
    pub fn run<P, W>(
        &mut self,
        platform: &mut P,
        input: &Receiver<Vec<u8>>,
        output: &mut W,
    ) -> Result<ExitReason, ConsoleError>
    where
        P: Platform + ?Sized,
        W: Write,
    {
        let mut closed = false;
        let mut quiet = 0u64;
        loop {
            self.stats.polls += 1;

            while !closed {
                match input.try_recv() {
                    Ok(line) if is_quit(&line) => {
                        info!(polls = self.stats.polls, "console closed by user");
                        return Ok(ExitReason::Quit);
                    }
                    Ok(line) => self.queued.push_back(line),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!(queued = self.queued.len(), "console input closed");
                        closed = true;
                    }
                }
            }

            let received = self.forward_output(platform, output)?;
            let sent = self.forward_input(platform)?;

            if closed && self.queued.is_empty() && !received && !sent {
                quiet += 1;
                if quiet > self.drain_polls {
                    return Ok(ExitReason::InputClosed);
                }
            } else {
                quiet = 0;
            }

            platform.pause()?;
        }
    }

    fn forward_output<P, W>(&mut self, platform: &mut P, output: &mut W) -> Result<bool, ConsoleError>
    where
        P: Platform + ?Sized,
        W: Write,
    {
        let Some(message) = self.endpoint.rx.receive(platform)? else {
            return Ok(false);
        };
        output.write_all(&message)?;
        output.flush()?;
        self.stats.received += 1;
        metrics::record_message("ctp");
        Ok(true)
    }

    fn forward_input<P: Platform + ?Sized>(&mut self, platform: &mut P) -> Result<bool, ConsoleError> {
        let Some(line) = self.queued.front() else {
            return Ok(false);
        };
        if !self.endpoint.tx.send(platform, line)? {
            return Ok(false);
        }
        debug!(len = line.len(), "line sent to core");
        self.queued.pop_front();
        self.stats.sent += 1;
        metrics::record_message("ptc");
        Ok(true)
    }
}

fn is_quit(line: &[u8]) -> bool {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line == QUIT_COMMAND.as_bytes()
}

/// Forward stdin lines, newline included, into a channel.
///
/// The reader thread ends at EOF, which disconnects the channel.
pub fn spawn_stdin_reader() -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut lock = stdin.lock();
        loop {
            let mut line = Vec::new();
            match lock.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rvcheck_bus::{Bus, BusError, check_transfer};
    use rvcheck_isa::Rv32;

    use super::*;

    /// Byte-addressed mailbox RAM.
    #[derive(Default)]
    struct Ram(BTreeMap<u64, u8>);

    impl Bus for Ram {
        fn word_bytes(&self) -> usize {
            4
        }

        fn write_instr(&mut self, _addr: u64, _data: &[u8]) -> rvcheck_bus::Result<()> {
            Err(BusError::NotMapped { port: "instr" })
        }

        fn write(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
            check_transfer(addr, data.len(), 4)?;
            for (i, byte) in data.iter().enumerate() {
                self.0.insert(addr + i as u64, *byte);
            }
            Ok(())
        }

        fn read(&mut self, addr: u64, buf: &mut [u8]) -> rvcheck_bus::Result<()> {
            check_transfer(addr, buf.len(), 4)?;
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.0.get(&(addr + i as u64)).copied().unwrap_or(0);
            }
            Ok(())
        }
    }

    /// Mailbox RAM plus a core that upper-cases every line it receives.
    struct EchoBoard {
        ram: Ram,
        core: Endpoint<Rv32>,
        banner: Option<&'static [u8]>,
        pauses: usize,
    }

    impl EchoBoard {
        fn new() -> Self {
            Self {
                ram: Ram::default(),
                core: Endpoint::core(),
                banner: None,
                pauses: 0,
            }
        }
    }

    impl Bus for EchoBoard {
        fn word_bytes(&self) -> usize {
            self.ram.word_bytes()
        }

        fn write_instr(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
            self.ram.write_instr(addr, data)
        }

        fn write(&mut self, addr: u64, data: &[u8]) -> rvcheck_bus::Result<()> {
            self.ram.write(addr, data)
        }

        fn read(&mut self, addr: u64, buf: &mut [u8]) -> rvcheck_bus::Result<()> {
            self.ram.read(addr, buf)
        }
    }

    impl Platform for EchoBoard {
        fn hold_core(&mut self) -> rvcheck_bus::Result<()> {
            Ok(())
        }

        fn release_core(&mut self) -> rvcheck_bus::Result<()> {
            Ok(())
        }

        fn pause(&mut self) -> rvcheck_bus::Result<()> {
            self.pauses += 1;
            if let Some(banner) = self.banner.take() {
                assert!(self.core.tx.send(&mut self.ram, banner).unwrap());
            } else if let Some(line) = self.core.rx.receive(&mut self.ram).unwrap() {
                let reply = line.to_ascii_uppercase();
                assert!(self.core.tx.send(&mut self.ram, &reply).unwrap());
            }
            Ok(())
        }
    }

    /// A closed input channel holding `items`.
    fn closed_input(items: &[&str]) -> Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel();
        for item in items {
            tx.send(item.as_bytes().to_vec()).unwrap();
        }
        rx
    }

    #[test]
    fn test_line_is_echoed_before_exit() {
        let mut board = EchoBoard::new();
        let mut console = Console::<Rv32>::new();
        console.reset(&mut board).unwrap();
        let mut out = Vec::new();

        let reason = console
            .run(&mut board, &closed_input(&["hello\n"]), &mut out)
            .unwrap();
        assert_eq!(reason, ExitReason::InputClosed);
        assert_eq!(out, b"HELLO\n");
        assert_eq!(console.stats().sent, 1);
        assert_eq!(console.stats().received, 1);
    }

    #[test]
    fn test_lines_wait_for_acknowledge() {
        let mut board = EchoBoard::new();
        let mut console = Console::<Rv32>::new();
        let mut out = Vec::new();

        console
            .run(&mut board, &closed_input(&["one\n", "two\n", "three\n"]), &mut out)
            .unwrap();
        // One line in flight at a time, delivered in order.
        assert_eq!(out, b"ONE\nTWO\nTHREE\n");
        assert_eq!(console.stats().sent, 3);
    }

    #[test]
    fn test_quit_stops_immediately() {
        let mut board = EchoBoard::new();
        let mut console = Console::<Rv32>::new();
        let mut out = Vec::new();

        let reason = console
            .run(&mut board, &closed_input(&["hi\n", "q\r\n"]), &mut out)
            .unwrap();
        assert_eq!(reason, ExitReason::Quit);
        assert!(out.is_empty());
        assert_eq!(console.stats().sent, 0);
        assert_eq!(board.pauses, 0);
    }

    #[test]
    fn test_unprompted_core_output_is_printed() {
        let mut board = EchoBoard::new();
        board.banner = Some(b"boot ok\n");
        let mut console = Console::<Rv32>::new();
        let mut out = Vec::new();

        console.run(&mut board, &closed_input(&[]), &mut out).unwrap();
        assert_eq!(out, b"boot ok\n");
    }

    #[test]
    fn test_drain_budget_bounds_quiet_polls() {
        let mut board = EchoBoard::new();
        let mut console = Console::<Rv32>::new().with_drain_polls(5);
        let mut out = Vec::new();

        console.run(&mut board, &closed_input(&[]), &mut out).unwrap();
        assert_eq!(board.pauses, 5);
        assert_eq!(console.stats().polls, 6);
    }

    #[test]
    fn test_quit_matching() {
        assert!(is_quit(b"q\n"));
        assert!(is_quit(b"q"));
        assert!(!is_quit(b"quit\n"));
        assert!(!is_quit(b" q\n"));
    }
}
