//! Shared-memory mailbox between the platform and the core.
//!
//! Two one-directional channels live in dedicated RAMs: PTC carries
//! platform-to-core messages and CTP carries core-to-platform messages.
//! Each channel is laid out as word-sized fields:
//!
//! ```text
//! [producer_count][consumer_count][payload_size][payload_data ...]
//! ```
//!
//! The producer only ever writes `producer_count`, the payload and its
//! size; the consumer only ever writes `consumer_count`. Publishing bumps
//! the producer count last, consuming bumps the consumer count after the
//! payload has been read, so neither side needs a lock. Both ends poll.

mod channel;
pub mod map;

pub use channel::{Channel, Endpoint, MailboxReader, MailboxWriter};

use rvcheck_bus::{BusError, status};
use thiserror::Error;

/// Mailbox errors.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("payload of {len} bytes does not fit the {capacity} byte window")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("publish without a successful write-ready check")]
    NotReserved,

    #[error("acknowledge without a pending message")]
    NothingPending,
}

impl MailboxError {
    pub const fn code(&self) -> u8 {
        match self {
            Self::Bus(err) => err.code(),
            Self::PayloadTooLarge { .. } => status::OVERFLOW,
            Self::NotReserved | Self::NothingPending => status::FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, MailboxError>;
