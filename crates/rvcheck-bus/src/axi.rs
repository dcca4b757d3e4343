//! AXI4 channel payloads and the signal-level view of a slave port.

use std::fmt;

/// Burst type INCR. Bursts are always one beat long, so the type only
/// needs to be legal.
pub const BURST_INCR: u8 = 0b01;

/// `resp` value for a successful transaction.
pub const RESP_OKAY: u8 = 0b00;

/// `resp` value for a successful exclusive access.
pub const RESP_EXOKAY: u8 = 0b01;

/// AXI slave ports exposed by the design.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxiPort {
    /// Instruction RAM write port, 32-bit beats.
    Instr,
    /// Data, mailbox and peripheral port, one register word per beat.
    Data,
}

impl AxiPort {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Instr => "instr",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for AxiPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Individual wires of one AXI slave port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AxiSignal {
    AwAddr,
    AwLen,
    AwSize,
    AwBurst,
    AwValid,
    AwReady,
    WData,
    WStrb,
    WLast,
    WValid,
    WReady,
    BResp,
    BValid,
    BReady,
    ArAddr,
    ArLen,
    ArSize,
    ArBurst,
    ArValid,
    ArReady,
    RData,
    RResp,
    RLast,
    RValid,
    RReady,
}

/// Signal-level access to the design's AXI slave ports.
///
/// `poke` drives an input wire, `peek` samples an output. Neither advances
/// time.
pub trait SignalPort {
    fn poke(&mut self, port: AxiPort, signal: AxiSignal, value: u64);
    fn peek(&self, port: AxiPort, signal: AxiSignal) -> u64;
}

/// Write address channel payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxiAw {
    pub addr: u64,
    /// Beats minus one.
    pub len: u8,
    pub size: u8,
    pub burst: u8,
}

impl AxiAw {
    /// Single-beat write of `1 << size` bytes.
    pub const fn single(addr: u64, size: u8) -> Self {
        Self {
            addr,
            len: 0,
            size,
            burst: BURST_INCR,
        }
    }

    pub fn drive<P: SignalPort + ?Sized>(&self, port: AxiPort, target: &mut P) {
        target.poke(port, AxiSignal::AwAddr, self.addr);
        target.poke(port, AxiSignal::AwLen, self.len.into());
        target.poke(port, AxiSignal::AwSize, self.size.into());
        target.poke(port, AxiSignal::AwBurst, self.burst.into());
    }
}

/// Write data channel payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxiW {
    pub data: u64,
    pub strb: u8,
    pub last: bool,
}

impl AxiW {
    pub const fn last(data: u64, strb: u8) -> Self {
        Self {
            data,
            strb,
            last: true,
        }
    }

    pub fn drive<P: SignalPort + ?Sized>(&self, port: AxiPort, target: &mut P) {
        target.poke(port, AxiSignal::WData, self.data);
        target.poke(port, AxiSignal::WStrb, self.strb.into());
        target.poke(port, AxiSignal::WLast, self.last.into());
    }
}

/// Write response channel payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxiB {
    pub resp: u8,
}

impl AxiB {
    pub fn sample<P: SignalPort + ?Sized>(port: AxiPort, target: &P) -> Self {
        Self {
            resp: (target.peek(port, AxiSignal::BResp) & 0b11) as u8,
        }
    }

    pub const fn is_ok(self) -> bool {
        self.resp == RESP_OKAY || self.resp == RESP_EXOKAY
    }
}

/// Read address channel payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxiAr {
    pub addr: u64,
    pub len: u8,
    pub size: u8,
    pub burst: u8,
}

impl AxiAr {
    pub const fn single(addr: u64, size: u8) -> Self {
        Self {
            addr,
            len: 0,
            size,
            burst: BURST_INCR,
        }
    }

    pub fn drive<P: SignalPort + ?Sized>(&self, port: AxiPort, target: &mut P) {
        target.poke(port, AxiSignal::ArAddr, self.addr);
        target.poke(port, AxiSignal::ArLen, self.len.into());
        target.poke(port, AxiSignal::ArSize, self.size.into());
        target.poke(port, AxiSignal::ArBurst, self.burst.into());
    }
}

/// Read data channel payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxiR {
    pub data: u64,
    pub resp: u8,
    pub last: bool,
}

impl AxiR {
    pub fn sample<P: SignalPort + ?Sized>(port: AxiPort, target: &P) -> Self {
        Self {
            data: target.peek(port, AxiSignal::RData),
            resp: (target.peek(port, AxiSignal::RResp) & 0b11) as u8,
            last: target.peek(port, AxiSignal::RLast) != 0,
        }
    }

    pub const fn is_ok(self) -> bool {
        self.resp == RESP_OKAY || self.resp == RESP_EXOKAY
    }
}
