//! Register model of the FrontPanel Wishbone master gateware.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure description of the endpoints the gateware exposes to the host: the
//! wire-in/wire-out addresses, the trigger registers and their bit numbers,
//! and the pipe channels used for burst transfers.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Endpoint map: wires, triggers, pipes and bit definitions |
//!
//! The bus itself is 16 bits wide in both address and data. Addresses
//! supplied by the host are masked, never rejected:
//!
//! ```
//! assert_eq!(okwb_regs::mask_address(0x0001_2345), 0x2345);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod regs;

pub use regs::{mask_address, mask_data, ADDRESS_MASK, WORD_BYTES};
