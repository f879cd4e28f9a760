//! Wishbone bus master over FrontPanel-style FPGA host primitives.
//!
//! The FPGA gateware bridges a 16-bit Wishbone bus to a USB host interface
//! that offers wires (registers), triggers (one-shot flags) and pipes (byte
//! streams). This crate encodes bus transactions onto those primitives and
//! waits for the gateware's completion handshake.
//!
//! # Layers
//!
//! ```text
//! WishboneMaster / SharedMaster   transaction state machine (+ lock)
//!   handshake                     poll STATUS trigger-out until finished
//!     Transport                   wires, triggers, pipes (caller-provided)
//! ```
//!
//! Device discovery and gateware configuration are not handled here: the
//! caller opens and configures the device, then hands a ready [`Transport`]
//! to the master. [`backends::SimulatedFpga`] stands in for hardware.
//!
//! # Quick start
//!
//! ```
//! use okwb_driver::{backends::SimulatedFpga, WishboneMaster};
//!
//! # fn main() -> okwb_driver::Result<()> {
//! let mut bus = WishboneMaster::new(SimulatedFpga::new());
//!
//! bus.single_write(0x05, 0x00FF)?;
//! assert_eq!(bus.single_read(0x05)?, 0x00FF);
//!
//! bus.burst_write(0x10, &[0, 1, 2, 3])?;
//! assert_eq!(bus.burst_read(0x10, 4)?, vec![0, 1, 2, 3]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod error;
pub mod handshake;
mod master;
mod shared;
mod transaction;
mod transport;

/// Endpoint map of the gateware (re-exported from okwb-regs).
pub mod regs {
    pub use okwb_regs::regs::*;
}

pub use error::{Result, WishboneError};
pub use handshake::{Completion, HandshakeStatus, PollPolicy};
pub use master::{MasterConfig, WishboneMaster};
pub use shared::SharedMaster;
pub use transaction::{
    decode_words, encode_words, Transaction, TransactionOutput, TransactionState,
};
pub use transport::Transport;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        MasterConfig, PollPolicy, Result, SharedMaster, Transaction, TransactionOutput,
        Transport, WishboneError, WishboneMaster,
    };
}
