// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated FPGA transport
//!
//! Implements the `Transport` trait on top of a pure-Rust model of the
//! Wishbone master gateware and a 64 K-word bus memory behind it. The model
//! follows the FrontPanel host semantics the driver relies on:
//!
//! ```text
//! wire-in      staged by set_register, visible to the FPGA after commit
//! wire-out     updated by the FPGA, visible to the host after refresh
//! trigger-in   CMD bit 0 reset, bit 1 read, bit 2 write
//! trigger-out  STATUS bit 1 finished, bit 2 interrupt; one-shot per refresh
//! pipe-in      little-endian words written from ADDR_WIRE upwards
//! pipe-out     little-endian words read from ADDR_WIRE upwards
//! ```
//!
//! Completion is delayed by a configurable number of status refreshes so
//! tests can exercise the polling loop, and can be suppressed entirely
//! ([`SimulatedFpga::stalled`]) to exercise the timeout path.

use crate::error::{Result, WishboneError};
use crate::transport::Transport;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use okwb_regs::regs::{
    cmd, status, ADDR_WIRE, BUS_WORDS, CMD_TRIGGER, DATA_OUT_WIRE, DATA_WIRE, DEBUG_WIRE,
    PIPE_IN, PIPE_OUT, STATUS_TRIGGER,
};
use tracing::trace;

const WIRE_IN_BASE: u8 = 0x00;
const WIRE_OUT_BASE: u8 = 0x20;
const TRIGGER_IN_BASE: u8 = 0x40;
const TRIGGER_OUT_BASE: u8 = 0x60;
const ENDPOINT_SPAN: u8 = 0x20;

/// Activity counters of a simulated device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Bus operations started (single or burst)
    pub transactions: u64,
    /// Reset triggers received
    pub resets: u64,
    /// Trigger-out refreshes issued by the host
    pub status_polls: u64,
    /// Bytes accepted on the pipe-in channel
    pub bytes_in: u64,
    /// Bytes returned on the pipe-out channel
    pub bytes_out: u64,
}

/// In-process model of the Wishbone master gateware.
#[derive(Debug)]
pub struct SimulatedFpga {
    staged: [u16; ENDPOINT_SPAN as usize],
    wire_in: [u16; ENDPOINT_SPAN as usize],
    wire_out_live: [u16; ENDPOINT_SPAN as usize],
    wire_out: [u16; ENDPOINT_SPAN as usize],
    memory: Vec<u16>,
    /// Trigger-out bits raised since the last refresh
    pending: u32,
    /// Trigger-out bits visible to the host
    latched: u32,
    /// Refreshes left before the in-flight operation reports finished
    completion: Option<u32>,
    latency: u32,
    stalled: bool,
    pipe_capacity: Option<usize>,
    debug_override: Option<u16>,
    connected: bool,
    stats: SimStats,
}

impl Default for SimulatedFpga {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFpga {
    /// Create a configured device with zeroed memory that completes every
    /// operation on the first status poll.
    pub fn new() -> Self {
        Self {
            staged: [0; ENDPOINT_SPAN as usize],
            wire_in: [0; ENDPOINT_SPAN as usize],
            wire_out_live: [0; ENDPOINT_SPAN as usize],
            wire_out: [0; ENDPOINT_SPAN as usize],
            memory: vec![0; BUS_WORDS],
            pending: 0,
            latched: 0,
            completion: None,
            latency: 0,
            stalled: false,
            pipe_capacity: None,
            debug_override: None,
            connected: true,
            stats: SimStats::default(),
        }
    }

    /// Report finished only after `polls` status refreshes have seen it busy.
    #[must_use]
    pub const fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Never report finished.
    #[must_use]
    pub const fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Accept or return at most `bytes` per pipe transfer.
    #[must_use]
    pub const fn with_pipe_capacity(mut self, bytes: usize) -> Self {
        self.pipe_capacity = Some(bytes);
        self
    }

    /// Enable or disable the stall at runtime.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
        if stalled {
            self.completion = None;
        }
    }

    /// Change the completion latency at runtime.
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// Raise the interrupt trigger-out; the host sees it on its next refresh.
    pub fn raise_interrupt(&mut self) {
        self.pending |= 1 << status::INTERRUPT;
    }

    /// Drive the debug wire-out with a fixed value instead of the last bus
    /// address.
    pub fn set_debug(&mut self, value: u16) {
        self.debug_override = Some(value);
        self.wire_out_live[usize::from(DEBUG_WIRE - WIRE_OUT_BASE)] = value;
    }

    /// Drop the link: every transport call fails until [`reconnect`](Self::reconnect).
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Restore the link.
    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    /// Read a bus word directly, bypassing the host interface.
    pub fn peek(&self, addr: u16) -> u16 {
        self.memory[usize::from(addr)]
    }

    /// Write a bus word directly, bypassing the host interface.
    pub fn poke(&mut self, addr: u16, value: u16) {
        self.memory[usize::from(addr)] = value;
    }

    /// Committed value of a wire-in, as the FPGA sees it.
    pub fn wire_in(&self, id: u8) -> Option<u16> {
        id.checked_sub(WIRE_IN_BASE)
            .filter(|&off| off < ENDPOINT_SPAN)
            .map(|off| self.wire_in[usize::from(off)])
    }

    /// Activity counters.
    pub const fn stats(&self) -> SimStats {
        self.stats
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(WishboneError::transport_unavailable("simulated link down"))
        }
    }

    fn endpoint(id: u8, base: u8) -> Result<usize> {
        match id.checked_sub(base) {
            Some(off) if off < ENDPOINT_SPAN => Ok(usize::from(off)),
            _ => Err(WishboneError::unknown_endpoint(id)),
        }
    }

    fn bus_address(&self) -> u16 {
        self.wire_in[usize::from(ADDR_WIRE - WIRE_IN_BASE)]
    }

    fn touch(&mut self, addr: u16) {
        if self.debug_override.is_none() {
            self.wire_out_live[usize::from(DEBUG_WIRE - WIRE_OUT_BASE)] = addr;
        }
    }

    fn start_operation(&mut self) {
        self.stats.transactions += 1;
        self.completion = (!self.stalled).then_some(self.latency);
    }

    fn reset_system(&mut self) {
        trace!("sim: reset");
        self.stats.resets += 1;
        self.staged = [0; ENDPOINT_SPAN as usize];
        self.wire_in = [0; ENDPOINT_SPAN as usize];
        self.wire_out_live = [0; ENDPOINT_SPAN as usize];
        self.memory.fill(0);
        self.pending = 0;
        self.completion = None;
        if let Some(value) = self.debug_override {
            self.wire_out_live[usize::from(DEBUG_WIRE - WIRE_OUT_BASE)] = value;
        }
    }

    fn capped(&self, length: usize) -> usize {
        self.pipe_capacity.map_or(length, |cap| length.min(cap))
    }
}

impl Transport for SimulatedFpga {
    fn set_register(&mut self, id: u8, value: u16) -> Result<()> {
        self.ensure_connected()?;
        let off = Self::endpoint(id, WIRE_IN_BASE)?;
        self.staged[off] = value;
        Ok(())
    }

    fn commit_registers(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.wire_in = self.staged;
        Ok(())
    }

    fn refresh_registers(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.wire_out = self.wire_out_live;
        Ok(())
    }

    fn get_register(&mut self, id: u8) -> Result<u16> {
        self.ensure_connected()?;
        let off = Self::endpoint(id, WIRE_OUT_BASE)?;
        Ok(self.wire_out[off])
    }

    fn activate_trigger(&mut self, id: u8, bit: u8) -> Result<()> {
        self.ensure_connected()?;
        Self::endpoint(id, TRIGGER_IN_BASE)?;
        if id != CMD_TRIGGER {
            return Ok(());
        }

        let addr = self.bus_address();
        match bit {
            cmd::RESET => self.reset_system(),
            cmd::START_READ => {
                let value = self.memory[usize::from(addr)];
                trace!("sim: read [{addr:#06x}] -> {value:#06x}");
                self.wire_out_live[usize::from(DATA_OUT_WIRE - WIRE_OUT_BASE)] = value;
                self.touch(addr);
                self.start_operation();
            }
            cmd::START_WRITE => {
                let value = self.wire_in[usize::from(DATA_WIRE - WIRE_IN_BASE)];
                trace!("sim: write [{addr:#06x}] <- {value:#06x}");
                self.memory[usize::from(addr)] = value;
                self.touch(addr);
                self.start_operation();
            }
            _ => {}
        }
        Ok(())
    }

    fn refresh_trigger_status(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.stats.status_polls += 1;
        match self.completion {
            Some(0) => {
                self.pending |= 1 << status::FINISHED;
                self.completion = None;
            }
            Some(left) => self.completion = Some(left - 1),
            None => {}
        }
        self.latched = self.pending;
        self.pending = 0;
        Ok(())
    }

    fn is_trigger_set(&mut self, id: u8, bit: u8) -> Result<bool> {
        self.ensure_connected()?;
        Self::endpoint(id, TRIGGER_OUT_BASE)?;
        Ok(id == STATUS_TRIGGER && bit < 32 && self.latched & (1 << bit) != 0)
    }

    fn write_block(&mut self, channel: u8, bytes: &[u8]) -> Result<usize> {
        self.ensure_connected()?;
        if channel != PIPE_IN {
            return Err(WishboneError::unknown_endpoint(channel));
        }

        let accepted = self.capped(bytes.len());
        let start = self.bus_address();
        let mut addr = start;
        let mut buf = &bytes[..accepted];
        while buf.remaining() >= 2 {
            self.memory[usize::from(addr)] = buf.get_u16_le();
            addr = addr.wrapping_add(1);
        }
        trace!("sim: pipe-in {accepted} bytes at {start:#06x}");

        self.stats.bytes_in += accepted as u64;
        self.touch(start);
        self.start_operation();
        Ok(accepted)
    }

    fn read_block(&mut self, channel: u8, length: usize) -> Result<Bytes> {
        self.ensure_connected()?;
        if channel != PIPE_OUT {
            return Err(WishboneError::unknown_endpoint(channel));
        }

        let returned = self.capped(length);
        let start = self.bus_address();
        let mut out = BytesMut::with_capacity(returned + 1);
        let mut addr = start;
        while out.len() < returned {
            out.put_u16_le(self.memory[usize::from(addr)]);
            addr = addr.wrapping_add(1);
        }
        out.truncate(returned);
        trace!("sim: pipe-out {returned} bytes from {start:#06x}");

        self.stats.bytes_out += returned as u64;
        self.touch(start);
        self.start_operation();
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_ins_reach_fpga_only_on_commit() {
        let mut fpga = SimulatedFpga::new();
        fpga.set_register(ADDR_WIRE, 0x1234).unwrap();
        assert_eq!(fpga.wire_in(ADDR_WIRE), Some(0));
        fpga.commit_registers().unwrap();
        assert_eq!(fpga.wire_in(ADDR_WIRE), Some(0x1234));
    }

    #[test]
    fn wire_outs_latch_on_refresh() {
        let mut fpga = SimulatedFpga::new();
        fpga.set_debug(0xBEEF);
        assert_eq!(fpga.get_register(DEBUG_WIRE).unwrap(), 0);
        fpga.refresh_registers().unwrap();
        assert_eq!(fpga.get_register(DEBUG_WIRE).unwrap(), 0xBEEF);
    }

    #[test]
    fn trigger_outs_are_one_shot() {
        let mut fpga = SimulatedFpga::new();
        fpga.activate_trigger(CMD_TRIGGER, cmd::START_WRITE).unwrap();
        fpga.refresh_trigger_status().unwrap();
        assert!(fpga.is_trigger_set(STATUS_TRIGGER, status::FINISHED).unwrap());
        fpga.refresh_trigger_status().unwrap();
        assert!(!fpga.is_trigger_set(STATUS_TRIGGER, status::FINISHED).unwrap());
    }

    #[test]
    fn latency_change_applies_to_next_operation() {
        let mut fpga = SimulatedFpga::new();
        fpga.set_latency(2);
        fpga.activate_trigger(CMD_TRIGGER, cmd::START_READ).unwrap();
        for _ in 0..2 {
            fpga.refresh_trigger_status().unwrap();
            assert!(!fpga.is_trigger_set(STATUS_TRIGGER, status::FINISHED).unwrap());
        }
        fpga.refresh_trigger_status().unwrap();
        assert!(fpga.is_trigger_set(STATUS_TRIGGER, status::FINISHED).unwrap());
    }

    #[test]
    fn pipe_in_wraps_at_top_of_bus() {
        let mut fpga = SimulatedFpga::new();
        fpga.set_register(ADDR_WIRE, 0xFFFF).unwrap();
        fpga.commit_registers().unwrap();
        let n = fpga.write_block(PIPE_IN, &[0x01, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(n, 4);
        assert_eq!(fpga.peek(0xFFFF), 1);
        assert_eq!(fpga.peek(0x0000), 2);
    }

    #[test]
    fn pipe_capacity_limits_transfers() {
        let mut fpga = SimulatedFpga::new().with_pipe_capacity(4);
        assert_eq!(fpga.write_block(PIPE_IN, &[0; 8]).unwrap(), 4);
        assert_eq!(fpga.read_block(PIPE_OUT, 8).unwrap().len(), 4);
        assert_eq!(fpga.stats().bytes_in, 4);
        assert_eq!(fpga.stats().bytes_out, 4);
    }

    #[test]
    fn pipes_are_directional() {
        let mut fpga = SimulatedFpga::new();
        assert!(matches!(
            fpga.write_block(PIPE_OUT, &[0, 0]),
            Err(WishboneError::UnknownEndpoint { id: PIPE_OUT })
        ));
        assert!(matches!(
            fpga.read_block(PIPE_IN, 2),
            Err(WishboneError::UnknownEndpoint { id: PIPE_IN })
        ));
    }

    #[test]
    fn endpoints_outside_their_range_are_rejected() {
        let mut fpga = SimulatedFpga::new();
        assert!(fpga.set_register(DATA_OUT_WIRE, 1).is_err());
        assert!(fpga.get_register(ADDR_WIRE).is_err());
        assert!(fpga.activate_trigger(STATUS_TRIGGER, 0).is_err());
        assert!(fpga.is_trigger_set(CMD_TRIGGER, 0).is_err());
    }

    #[test]
    fn reset_clears_memory_and_wires() {
        let mut fpga = SimulatedFpga::new();
        fpga.poke(7, 99);
        fpga.set_register(DATA_WIRE, 5).unwrap();
        fpga.commit_registers().unwrap();
        fpga.activate_trigger(CMD_TRIGGER, cmd::RESET).unwrap();
        assert_eq!(fpga.peek(7), 0);
        assert_eq!(fpga.wire_in(DATA_WIRE), Some(0));
        assert_eq!(fpga.stats().resets, 1);
    }

    #[test]
    fn disconnected_link_fails_every_call() {
        let mut fpga = SimulatedFpga::new();
        fpga.disconnect();
        assert!(fpga.commit_registers().is_err());
        assert!(fpga.refresh_trigger_status().is_err());
        fpga.reconnect();
        assert!(fpga.commit_registers().is_ok());
    }
}
