//! Software transport implementations
//!
//! Two transports ship with the driver:
//! - **Simulated**: in-process model of the Wishbone master gateware with a
//!   64 K-word bus memory. Used for CI and the CLI; no hardware required.
//! - **Recording**: wraps another transport and records every primitive
//!   call, for checking how transactions are sequenced on the wire.
//!
//! The USB FrontPanel session itself is provided by the caller.

pub mod recording;
pub mod simulated;

pub use recording::{RecordingTransport, TransportOp};
pub use simulated::{SimStats, SimulatedFpga};
