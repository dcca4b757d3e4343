use std::marker::PhantomData;

use rvcheck_bus::{Bus, round_up_to_word};
use rvcheck_isa::Xlen;
use tracing::{debug, trace};

use crate::map::{CTP_RAM, PTC_RAM, Region};
use crate::{MailboxError, Result};

/// Placement of one channel in the data port's address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    region: Region,
}

impl Channel {
    pub const fn new(region: Region) -> Self {
        Self { region }
    }

    /// Platform-to-core channel.
    pub const fn ptc() -> Self {
        Self::new(PTC_RAM)
    }

    /// Core-to-platform channel.
    pub const fn ctp() -> Self {
        Self::new(CTP_RAM)
    }

    pub const fn region(&self) -> Region {
        self.region
    }

    pub const fn producer_addr(&self) -> u64 {
        self.region.base
    }

    pub const fn consumer_addr(&self, word: usize) -> u64 {
        self.region.base + word as u64
    }

    pub const fn size_addr(&self, word: usize) -> u64 {
        self.region.base + 2 * word as u64
    }

    pub const fn data_addr(&self, word: usize) -> u64 {
        self.region.base + 3 * word as u64
    }

    /// Bytes available for payload after the three header words.
    pub const fn capacity(&self, word: usize) -> usize {
        self.region.size.saturating_sub(3 * word)
    }
}

/// Producing end of a channel.
///
/// The shadow counter holds the number of messages this side has claimed.
/// A successful [`write_ready`](Self::write_ready) claims the next slot and
/// [`publish`](Self::publish) makes it visible.
#[derive(Debug)]
pub struct MailboxWriter<X: Xlen> {
    channel: Channel,
    shadow: u64,
    reserved: bool,
    _xlen: PhantomData<X>,
}

impl<X: Xlen> MailboxWriter<X> {
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            shadow: 0,
            reserved: false,
            _xlen: PhantomData,
        }
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Messages claimed so far.
    pub const fn shadow(&self) -> u64 {
        self.shadow
    }

    /// Largest payload one message can carry.
    pub const fn capacity(&self) -> usize {
        self.channel.capacity(X::REG_BYTES)
    }

    /// Check whether the consumer has acknowledged every message so far.
    ///
    /// On success the next slot is claimed, so a second check before
    /// publishing reports not ready.
    pub fn write_ready<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<bool> {
        let consumer = bus.read_word(self.channel.consumer_addr(X::REG_BYTES))?;
        if X::truncate(consumer) != X::truncate(self.shadow) {
            return Ok(false);
        }
        self.shadow = self.shadow.wrapping_add(1);
        self.reserved = true;
        Ok(true)
    }

    /// Write the payload, then its size, then bump the producer count.
    ///
    /// Requires a preceding successful [`write_ready`](Self::write_ready).
    /// A payload that does not fit releases the claimed slot.
    pub fn publish<B: Bus + ?Sized>(&mut self, bus: &mut B, payload: &[u8]) -> Result<()> {
        if !self.reserved {
            return Err(MailboxError::NotReserved);
        }
        let padded = round_up_to_word(payload.len(), X::REG_BYTES);
        if padded > self.capacity() {
            self.shadow = self.shadow.wrapping_sub(1);
            self.reserved = false;
            return Err(MailboxError::PayloadTooLarge {
                len: payload.len(),
                capacity: self.capacity(),
            });
        }

        if padded > 0 {
            let mut words = payload.to_vec();
            words.resize(padded, 0);
            bus.write(self.channel.data_addr(X::REG_BYTES), &words)?;
        }
        bus.write_word(self.channel.size_addr(X::REG_BYTES), payload.len() as u64)?;
        bus.write_word(self.channel.producer_addr(), X::truncate(self.shadow))?;
        self.reserved = false;

        debug!(
            channel = format!("{:#x}", self.channel.producer_addr()),
            len = payload.len(),
            count = self.shadow,
            "published message"
        );
        Ok(())
    }

    /// Publish if the channel is free. Returns false when it is still busy.
    pub fn send<B: Bus + ?Sized>(&mut self, bus: &mut B, payload: &[u8]) -> Result<bool> {
        let padded = round_up_to_word(payload.len(), X::REG_BYTES);
        if padded > self.capacity() {
            return Err(MailboxError::PayloadTooLarge {
                len: payload.len(),
                capacity: self.capacity(),
            });
        }
        if !self.write_ready(bus)? {
            return Ok(false);
        }
        self.publish(bus, payload)?;
        Ok(true)
    }
}

/// Consuming end of a channel.
#[derive(Debug)]
pub struct MailboxReader<X: Xlen> {
    channel: Channel,
    shadow: u64,
    pending: Option<usize>,
    _xlen: PhantomData<X>,
}

impl<X: Xlen> MailboxReader<X> {
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            shadow: 0,
            pending: None,
            _xlen: PhantomData,
        }
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Messages observed so far.
    pub const fn shadow(&self) -> u64 {
        self.shadow
    }

    /// Size of the message taken by the last ready check, until acknowledged.
    pub const fn pending(&self) -> Option<usize> {
        self.pending
    }

    /// Poll for a published message.
    ///
    /// Returns the payload size when the producer count is ahead of the
    /// shadow, advancing the shadow by one. Once a message is taken, later
    /// checks report nothing until the producer publishes again.
    ///
    /// A size that does not fit the data window is rejected and the message
    /// stays untaken.
    pub fn read_ready<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<Option<usize>> {
        let producer = bus.read_word(self.channel.producer_addr())?;
        if X::truncate(producer) == X::truncate(self.shadow) {
            return Ok(None);
        }
        let size = bus.read_word(self.channel.size_addr(X::REG_BYTES))?;
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let capacity = self.channel.capacity(X::REG_BYTES);
        if size > capacity {
            return Err(MailboxError::PayloadTooLarge { len: size, capacity });
        }
        self.shadow = self.shadow.wrapping_add(1);
        trace!(count = self.shadow, size, "message pending");
        self.pending = Some(size);
        Ok(self.pending)
    }

    /// Read `len` payload bytes. The bus transfer is rounded up to words.
    pub fn read_payload<B: Bus + ?Sized>(&self, bus: &mut B, len: usize) -> Result<Vec<u8>> {
        let padded = round_up_to_word(len, X::REG_BYTES);
        let capacity = self.channel.capacity(X::REG_BYTES);
        if padded > capacity {
            return Err(MailboxError::PayloadTooLarge { len, capacity });
        }
        let mut buf = vec![0u8; padded];
        if padded > 0 {
            bus.read(self.channel.data_addr(X::REG_BYTES), &mut buf)?;
        }
        buf.truncate(len);
        Ok(buf)
    }

    /// Tell the producer the pending message has been consumed.
    pub fn acknowledge<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        if self.pending.take().is_none() {
            return Err(MailboxError::NothingPending);
        }
        bus.write_word(
            self.channel.consumer_addr(X::REG_BYTES),
            X::truncate(self.shadow),
        )?;
        Ok(())
    }

    /// Take, read and acknowledge one message if available.
    pub fn receive<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<Option<Vec<u8>>> {
        let Some(size) = self.read_ready(bus)? else {
            return Ok(None);
        };
        let payload = self.read_payload(bus, size)?;
        self.acknowledge(bus)?;
        Ok(Some(payload))
    }
}

/// One side of the mailbox: a writer on its outgoing channel and a reader
/// on its incoming one.
#[derive(Debug)]
pub struct Endpoint<X: Xlen> {
    pub tx: MailboxWriter<X>,
    pub rx: MailboxReader<X>,
}

impl<X: Xlen> Endpoint<X> {
    pub const fn new(outgoing: Channel, incoming: Channel) -> Self {
        Self {
            tx: MailboxWriter::new(outgoing),
            rx: MailboxReader::new(incoming),
        }
    }

    /// Platform side: sends on PTC, receives on CTP.
    pub const fn platform() -> Self {
        Self::new(Channel::ptc(), Channel::ctp())
    }

    /// Core side: sends on CTP, receives on PTC.
    pub const fn core() -> Self {
        Self::new(Channel::ctp(), Channel::ptc())
    }

    /// Clear both channel regions so the counters start from zero.
    pub fn reset<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        for channel in [self.tx.channel(), self.rx.channel()] {
            let region = channel.region();
            bus.fill(region.base, region.size, 0)?;
        }
        *self = Self::new(self.tx.channel(), self.rx.channel());
        Ok(())
    }
}
