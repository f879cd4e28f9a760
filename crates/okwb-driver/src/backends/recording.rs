//! Recording transport
//!
//! Wraps another transport and keeps an ordered log of every primitive
//! call. Calls are recorded before they are forwarded, so a failing call
//! still shows up in the log.

use crate::error::Result;
use crate::transport::Transport;
use bytes::Bytes;
use tracing::trace;

/// One primitive call made against a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    /// Stage a wire-in
    SetRegister {
        /// Wire-in ID
        id: u8,
        /// Staged value
        value: u16,
    },
    /// Flush staged wire-ins
    CommitRegisters,
    /// Latch wire-outs
    RefreshRegisters,
    /// Read a latched wire-out
    GetRegister {
        /// Wire-out ID
        id: u8,
    },
    /// Pulse a trigger-in bit
    ActivateTrigger {
        /// Trigger-in ID
        id: u8,
        /// Bit number
        bit: u8,
    },
    /// Latch trigger-outs
    RefreshTriggerStatus,
    /// Test a latched trigger-out bit
    IsTriggerSet {
        /// Trigger-out ID
        id: u8,
        /// Bit number
        bit: u8,
    },
    /// Stream bytes to a pipe-in
    WriteBlock {
        /// Pipe-in channel
        channel: u8,
        /// Bytes offered
        len: usize,
    },
    /// Stream bytes from a pipe-out
    ReadBlock {
        /// Pipe-out channel
        channel: u8,
        /// Bytes requested
        len: usize,
    },
}

/// Transport wrapper that logs every call
#[derive(Debug)]
pub struct RecordingTransport<T> {
    inner: T,
    ops: Vec<TransportOp>,
}

impl<T: Transport> RecordingTransport<T> {
    /// Wrap `inner`
    pub const fn new(inner: T) -> Self {
        Self {
            inner,
            ops: Vec::new(),
        }
    }

    /// Calls recorded so far
    pub fn ops(&self) -> &[TransportOp] {
        &self.ops
    }

    /// Drain the recorded calls
    pub fn take_ops(&mut self) -> Vec<TransportOp> {
        std::mem::take(&mut self.ops)
    }

    /// Wrapped transport
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Wrapped transport, mutably
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap, discarding the log
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn record(&mut self, op: TransportOp) {
        trace!("transport: {op:?}");
        self.ops.push(op);
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    fn set_register(&mut self, id: u8, value: u16) -> Result<()> {
        self.record(TransportOp::SetRegister { id, value });
        self.inner.set_register(id, value)
    }

    fn commit_registers(&mut self) -> Result<()> {
        self.record(TransportOp::CommitRegisters);
        self.inner.commit_registers()
    }

    fn refresh_registers(&mut self) -> Result<()> {
        self.record(TransportOp::RefreshRegisters);
        self.inner.refresh_registers()
    }

    fn get_register(&mut self, id: u8) -> Result<u16> {
        self.record(TransportOp::GetRegister { id });
        self.inner.get_register(id)
    }

    fn activate_trigger(&mut self, id: u8, bit: u8) -> Result<()> {
        self.record(TransportOp::ActivateTrigger { id, bit });
        self.inner.activate_trigger(id, bit)
    }

    fn refresh_trigger_status(&mut self) -> Result<()> {
        self.record(TransportOp::RefreshTriggerStatus);
        self.inner.refresh_trigger_status()
    }

    fn is_trigger_set(&mut self, id: u8, bit: u8) -> Result<bool> {
        self.record(TransportOp::IsTriggerSet { id, bit });
        self.inner.is_trigger_set(id, bit)
    }

    fn write_block(&mut self, channel: u8, bytes: &[u8]) -> Result<usize> {
        self.record(TransportOp::WriteBlock {
            channel,
            len: bytes.len(),
        });
        self.inner.write_block(channel, bytes)
    }

    fn read_block(&mut self, channel: u8, length: usize) -> Result<Bytes> {
        self.record(TransportOp::ReadBlock {
            channel,
            len: length,
        });
        self.inner.read_block(channel, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedFpga;

    #[test]
    fn records_in_call_order() {
        let mut rec = RecordingTransport::new(SimulatedFpga::new());
        rec.set_register(0x00, 3).unwrap();
        rec.commit_registers().unwrap();
        rec.activate_trigger(0x40, 1).unwrap();
        assert_eq!(
            rec.ops(),
            &[
                TransportOp::SetRegister { id: 0x00, value: 3 },
                TransportOp::CommitRegisters,
                TransportOp::ActivateTrigger { id: 0x40, bit: 1 },
            ]
        );
    }

    #[test]
    fn inner_transport_is_reachable_without_recording() {
        let mut rec = RecordingTransport::new(SimulatedFpga::new());
        rec.inner_mut().poke(3, 0x55);
        rec.set_register(0x00, 3).unwrap();
        assert_eq!(rec.ops().len(), 1);

        let fpga = rec.into_inner();
        assert_eq!(fpga.peek(3), 0x55);
    }

    #[test]
    fn failed_calls_are_still_recorded() {
        let mut fpga = SimulatedFpga::new();
        fpga.disconnect();
        let mut rec = RecordingTransport::new(fpga);
        assert!(rec.refresh_registers().is_err());
        assert_eq!(rec.take_ops(), vec![TransportOp::RefreshRegisters]);
        assert!(rec.ops().is_empty());
    }
}
