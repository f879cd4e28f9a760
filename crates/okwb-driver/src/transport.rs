//! Transport abstraction for the FPGA host interface
//!
//! The Wishbone master only needs six kinds of primitive: staged wire-in
//! writes, latched wire-out reads, trigger-in pulses, latched trigger-out
//! flags, and the two block pipes. Anything that can provide them (a USB
//! FrontPanel session, a simulator, a recorder) can drive the bus.

use crate::error::Result;
use bytes::Bytes;
use std::fmt::Debug;

/// Host-side primitives exposed by the FPGA interface
///
/// Device discovery and gateware configuration happen before a transport
/// is handed to the master; every method here assumes a configured device.
pub trait Transport: Debug + Send {
    /// Stage a wire-in value. Nothing reaches the FPGA until
    /// [`commit_registers`](Self::commit_registers).
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is unknown or the link is down.
    fn set_register(&mut self, id: u8, value: u16) -> Result<()>;

    /// Flush all staged wire-ins to the FPGA in one transfer.
    ///
    /// # Errors
    ///
    /// Returns error if the link is down.
    fn commit_registers(&mut self) -> Result<()>;

    /// Latch the current wire-out values from the FPGA.
    ///
    /// # Errors
    ///
    /// Returns error if the link is down.
    fn refresh_registers(&mut self) -> Result<()>;

    /// Read a wire-out value as of the last
    /// [`refresh_registers`](Self::refresh_registers).
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is unknown or the link is down.
    fn get_register(&mut self, id: u8) -> Result<u16>;

    /// Pulse one bit of a trigger-in register.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is unknown or the link is down.
    fn activate_trigger(&mut self, id: u8, bit: u8) -> Result<()>;

    /// Latch pending trigger-out flags from the FPGA. Flags are one-shot:
    /// each refresh replaces the previously latched set.
    ///
    /// # Errors
    ///
    /// Returns error if the link is down.
    fn refresh_trigger_status(&mut self) -> Result<()>;

    /// Test one bit of a trigger-out register as of the last refresh.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is unknown or the link is down.
    fn is_trigger_set(&mut self, id: u8, bit: u8) -> Result<bool>;

    /// Stream bytes to a pipe-in channel, returning the number accepted.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unknown or the link is down.
    fn write_block(&mut self, channel: u8, bytes: &[u8]) -> Result<usize>;

    /// Stream `length` bytes from a pipe-out channel.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unknown or the link is down.
    fn read_block(&mut self, channel: u8, length: usize) -> Result<Bytes>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_register(&mut self, id: u8, value: u16) -> Result<()> {
        (**self).set_register(id, value)
    }

    fn commit_registers(&mut self) -> Result<()> {
        (**self).commit_registers()
    }

    fn refresh_registers(&mut self) -> Result<()> {
        (**self).refresh_registers()
    }

    fn get_register(&mut self, id: u8) -> Result<u16> {
        (**self).get_register(id)
    }

    fn activate_trigger(&mut self, id: u8, bit: u8) -> Result<()> {
        (**self).activate_trigger(id, bit)
    }

    fn refresh_trigger_status(&mut self) -> Result<()> {
        (**self).refresh_trigger_status()
    }

    fn is_trigger_set(&mut self, id: u8, bit: u8) -> Result<bool> {
        (**self).is_trigger_set(id, bit)
    }

    fn write_block(&mut self, channel: u8, bytes: &[u8]) -> Result<usize> {
        (**self).write_block(channel, bytes)
    }

    fn read_block(&mut self, channel: u8, length: usize) -> Result<Bytes> {
        (**self).read_block(channel, length)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_register(&mut self, id: u8, value: u16) -> Result<()> {
        (**self).set_register(id, value)
    }

    fn commit_registers(&mut self) -> Result<()> {
        (**self).commit_registers()
    }

    fn refresh_registers(&mut self) -> Result<()> {
        (**self).refresh_registers()
    }

    fn get_register(&mut self, id: u8) -> Result<u16> {
        (**self).get_register(id)
    }

    fn activate_trigger(&mut self, id: u8, bit: u8) -> Result<()> {
        (**self).activate_trigger(id, bit)
    }

    fn refresh_trigger_status(&mut self) -> Result<()> {
        (**self).refresh_trigger_status()
    }

    fn is_trigger_set(&mut self, id: u8, bit: u8) -> Result<bool> {
        (**self).is_trigger_set(id, bit)
    }

    fn write_block(&mut self, channel: u8, bytes: &[u8]) -> Result<usize> {
        (**self).write_block(channel, bytes)
    }

    fn read_block(&mut self, channel: u8, length: usize) -> Result<Bytes> {
        (**self).read_block(channel, length)
    }
}
