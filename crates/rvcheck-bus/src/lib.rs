//! Word-granular bus transactions.
//!
//! The [`Bus`] trait is the only way the platform moves bytes in and out of
//! the design: firmware loading, the mailbox and memory resets all go
//! through it. Two backends implement it:
//!
//! - [`SimBus`] drives the AXI slave ports of a simulated design signal by
//!   signal, advancing the clock while it waits on each handshake.
//! - [`MmioBus`] performs volatile loads and stores through `/dev/mem`
//!   mappings of the same RAMs on real hardware.
//!
//! Every transfer is a sequence of single-beat transactions, one word per
//! beat. Misaligned or empty requests are rejected before any signal or
//! memory is touched.

pub mod axi;
mod bus;
mod clock;
mod error;
mod mmio;
mod sim;

pub use bus::{Bus, INSTR_GRANULE, check_transfer, round_up_to_word};
pub use clock::{ClockError, Clocked};
pub use error::{BusError, Result, status};
pub use mmio::{MappedWindow, MmioBus};
pub use sim::SimBus;

/// Register metric descriptions.
pub fn init_metrics() {
    metrics::describe_counter!("rvcheck_bus_beats", "Single-beat bus transactions issued");
}
