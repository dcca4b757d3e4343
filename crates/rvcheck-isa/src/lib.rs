//! RISC-V definitions shared by the rvcheck crates.
//!
//! Only the parts of the ISA the checker needs: register width markers and
//! a classifier that sorts a 32-bit encoding into the opcode families whose
//! architectural effects are verified differently.

mod classify;
pub mod csr;
mod xlen;

pub use classify::{InstrClass, StoreWidth, classify, decode_funct3, decode_opcode, decode_rd};
pub use xlen::{Rv32, Rv64, Xlen};

#[cfg(test)]
mod tests;
