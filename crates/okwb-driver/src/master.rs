//! Wishbone transaction state machine
//!
//! Sequences wire-in writes, trigger pulses, pipe transfers and the
//! completion handshake for each bus operation:
//!
//! ```text
//! single read   ADDR → commit → CMD bit 1 → wait finished → refresh → DATA_OUT
//! single write  ADDR, DATA → commit → CMD bit 2 → wait finished
//! burst read    ADDR → commit → pipe-out (starts the burst) → wait finished
//! burst write   ADDR → commit → pipe-in (starts the burst) → wait finished
//! reset         CMD bit 0 → settle delay → ADDR = DATA = 0 → commit
//! ```
//!
//! The protocol is not reentrant: interleaving two transactions corrupts
//! the address/data pair. The master takes `&mut self` for every
//! operation; use [`SharedMaster`](crate::SharedMaster) to share one
//! between threads.

use crate::error::{Result, WishboneError};
use crate::handshake::{self, Completion, HandshakeStatus, PollPolicy};
use crate::transaction::{
    burst_byte_len, check_burst_len, decode_words, encode_words, Transaction, TransactionOutput,
    TransactionState,
};
use crate::transport::Transport;
use bytes::Bytes;
use okwb_regs::regs::{
    cmd, ADDR_WIRE, CMD_TRIGGER, DATA_OUT_WIRE, DATA_WIRE, DEBUG_WIRE, PIPE_IN, PIPE_OUT,
};
use okwb_regs::{mask_address, mask_data};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Master configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    /// Delay after the reset pulse before wire-ins are restored
    pub reset_settle: Duration,
    /// Completion wait bound and pacing
    pub poll: PollPolicy,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            reset_settle: Duration::from_millis(100),
            poll: PollPolicy::default(),
        }
    }
}

impl MasterConfig {
    /// Set the reset settle delay
    #[must_use]
    pub const fn with_reset_settle(mut self, settle: Duration) -> Self {
        self.reset_settle = settle;
        self
    }

    /// Set the completion poll policy
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

/// Wishbone bus master driving one transport
#[derive(Debug)]
pub struct WishboneMaster<T> {
    transport: T,
    config: MasterConfig,
    state: TransactionState,
}

impl<T: Transport> WishboneMaster<T> {
    /// Create a master with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, MasterConfig::default())
    }

    /// Create a master with an explicit configuration
    pub fn with_config(transport: T, config: MasterConfig) -> Self {
        info!(
            "Wishbone master ready (reset settle {:?}, poll timeout {:?})",
            config.reset_settle, config.poll.timeout
        );
        Self {
            transport,
            config,
            state: TransactionState::Idle,
        }
    }

    /// Active configuration
    pub const fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Replace the completion poll policy
    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.config.poll = poll;
    }

    /// Step of the transaction in flight. `Idle` between transactions,
    /// including after one that failed.
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably. Calls made through it bypass the
    /// state machine.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Pulse the gateware reset, wait the settle delay, then restore the
    /// address and data wire-ins to zero.
    ///
    /// Reset has no completion handshake.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn reset(&mut self) -> Result<()> {
        self.run("reset", |m| {
            m.transport.activate_trigger(CMD_TRIGGER, cmd::RESET)?;
            m.advance(TransactionState::Triggered);

            if !m.config.reset_settle.is_zero() {
                std::thread::sleep(m.config.reset_settle);
            }

            m.transport.set_register(ADDR_WIRE, 0)?;
            m.transport.set_register(DATA_WIRE, 0)?;
            m.transport.commit_registers()?;
            m.advance(TransactionState::Complete);

            info!("Wishbone system reset");
            Ok(())
        })
    }

    /// Read one word.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the handshake times out.
    pub fn single_read(&mut self, addr: u32) -> Result<u16> {
        let addr = mask_address(addr);
        self.run("single read", |m| {
            m.transport.set_register(ADDR_WIRE, addr)?;
            m.transport.commit_registers()?;
            m.advance(TransactionState::AddressSet);

            m.transport.activate_trigger(CMD_TRIGGER, cmd::START_READ)?;
            m.advance(TransactionState::Triggered);

            let done = m.await_finished()?;

            m.transport.refresh_registers()?;
            let value = m.transport.get_register(DATA_OUT_WIRE)?;
            m.advance(TransactionState::Complete);

            debug!("read [{addr:#06x}] -> {value:#06x} ({} polls)", done.polls);
            Ok(value)
        })
    }

    /// Write one word. Only the low 16 bits of `value` are sent.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the handshake times out.
    pub fn single_write(&mut self, addr: u32, value: u32) -> Result<()> {
        let addr = mask_address(addr);
        let value = mask_data(value);
        self.run("single write", |m| {
            m.transport.set_register(ADDR_WIRE, addr)?;
            m.transport.set_register(DATA_WIRE, value)?;
            m.transport.commit_registers()?;
            m.advance(TransactionState::AddressSet);

            m.transport.activate_trigger(CMD_TRIGGER, cmd::START_WRITE)?;
            m.advance(TransactionState::Triggered);

            let done = m.await_finished()?;
            m.advance(TransactionState::Complete);

            debug!("write [{addr:#06x}] <- {value:#06x} ({} polls)", done.polls);
            Ok(())
        })
    }

    /// Read `count` consecutive words starting at `addr`.
    ///
    /// A zero count is a legal zero-length transfer and still waits for the
    /// handshake.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails, moves fewer bytes than
    /// requested, or the handshake times out.
    pub fn burst_read(&mut self, addr: u32, count: usize) -> Result<Vec<i16>> {
        let len = burst_byte_len(count)?;
        let bytes = self.burst_read_bytes(addr, len)?;
        decode_words(&bytes)
    }

    /// Read `len` raw bytes through the pipe-out channel starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`WishboneError::MalformedBurstLength`] before touching the
    /// transport if `len` is not a whole number of words. Otherwise as
    /// [`burst_read`](Self::burst_read).
    pub fn burst_read_bytes(&mut self, addr: u32, len: usize) -> Result<Bytes> {
        check_burst_len(len)?;
        let addr = mask_address(addr);
        self.run("burst read", |m| {
            m.transport.set_register(ADDR_WIRE, addr)?;
            m.transport.commit_registers()?;
            m.advance(TransactionState::AddressSet);

            let bytes = m.transport.read_block(PIPE_OUT, len)?;
            m.advance(TransactionState::Triggered);
            if bytes.len() != len {
                return Err(WishboneError::short_transfer(PIPE_OUT, len, bytes.len()));
            }

            let done = m.await_finished()?;
            m.advance(TransactionState::Complete);

            debug!("burst read [{addr:#06x}] {len} bytes ({} polls)", done.polls);
            Ok(bytes)
        })
    }

    /// Write `words` to consecutive addresses starting at `addr`.
    ///
    /// The transport's own limits govern how long a burst may be.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails, accepts fewer bytes than
    /// offered, or the handshake times out.
    pub fn burst_write(&mut self, addr: u32, words: &[i16]) -> Result<()> {
        let bytes = encode_words(words);
        self.burst_write_bytes(addr, &bytes)
    }

    /// Write raw little-endian word bytes through the pipe-in channel.
    ///
    /// # Errors
    ///
    /// Returns [`WishboneError::MalformedBurstLength`] before touching the
    /// transport if `bytes` is not a whole number of words. Otherwise as
    /// [`burst_write`](Self::burst_write).
    pub fn burst_write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        check_burst_len(bytes.len())?;
        let addr = mask_address(addr);
        self.run("burst write", |m| {
            m.transport.set_register(ADDR_WIRE, addr)?;
            m.transport.commit_registers()?;
            m.advance(TransactionState::AddressSet);

            let accepted = m.transport.write_block(PIPE_IN, bytes)?;
            m.advance(TransactionState::Triggered);
            if accepted != bytes.len() {
                return Err(WishboneError::short_transfer(PIPE_IN, bytes.len(), accepted));
            }

            let done = m.await_finished()?;
            m.advance(TransactionState::Complete);

            debug!(
                "burst write [{addr:#06x}] {} bytes ({} polls)",
                bytes.len(),
                done.polls
            );
            Ok(())
        })
    }

    /// Read the debug wire-out. No handshake.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn read_debug(&mut self) -> Result<u16> {
        self.transport.refresh_registers()?;
        self.transport.get_register(DEBUG_WIRE)
    }

    /// Test the interrupt trigger-out, independent of any transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn is_interrupt(&mut self) -> Result<bool> {
        handshake::poll_interrupt(&mut self.transport)
    }

    /// Test the finished trigger-out once.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn poll_finished(&mut self) -> Result<bool> {
        handshake::poll_finished(&mut self.transport)
    }

    /// Refresh trigger-outs once and read both status bits.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn status(&mut self) -> Result<HandshakeStatus> {
        handshake::poll_status(&mut self.transport)
    }

    /// Run one transaction.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation.
    pub fn execute(&mut self, transaction: &Transaction) -> Result<TransactionOutput> {
        debug!("execute {}", transaction.kind());
        match transaction {
            Transaction::Reset => self.reset().map(|()| TransactionOutput::None),
            Transaction::SingleRead { addr } => {
                self.single_read(*addr).map(TransactionOutput::Word)
            }
            Transaction::SingleWrite { addr, value } => self
                .single_write(*addr, *value)
                .map(|()| TransactionOutput::None),
            Transaction::BurstRead { addr, count } => {
                self.burst_read(*addr, *count).map(TransactionOutput::Words)
            }
            Transaction::BurstWrite { addr, words } => self
                .burst_write(*addr, words)
                .map(|()| TransactionOutput::None),
        }
    }

    /// Drive one transaction from `Idle` and return to `Idle` whether it
    /// completes or fails. Nothing is rolled back on failure.
    fn run<R>(&mut self, what: &str, op: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let result = op(self);
        if let Err(err) = &result {
            warn!("{what} abandoned in {}: {err}", self.state);
        }
        self.advance(TransactionState::Idle);
        result
    }

    fn advance(&mut self, next: TransactionState) {
        trace!("{} -> {next}", self.state);
        self.state = next;
    }

    fn await_finished(&mut self) -> Result<Completion> {
        self.advance(TransactionState::Polling);
        handshake::wait_finished(&mut self.transport, &self.config.poll)
    }
}
