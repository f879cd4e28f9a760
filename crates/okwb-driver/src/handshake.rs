//! Completion handshake on the status trigger-out register
//!
//! Every triggered operation finishes by pulsing `STATUS_TRIGGER` bit
//! [`status::FINISHED`]. There is no asynchronous notification, so the host
//! polls: refresh trigger-outs, test the bit, repeat.
//!
//! The wait is bounded by a [`PollPolicy`]: a short spin phase for fast
//! completions, then sleeps with exponential backoff, until either the bit
//! asserts or the wall-clock/poll-count bound expires.

use crate::error::{Result, WishboneError};
use crate::transport::Transport;
use okwb_regs::regs::{status, STATUS_TRIGGER};
use std::time::{Duration, Instant};

/// Snapshot of the status trigger-out register after one refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeStatus {
    /// Current transaction has completed
    pub finished: bool,
    /// A bus slave raised an interrupt
    pub interrupt: bool,
}

/// Outcome of a successful completion wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Status polls issued, including the one that observed finished
    pub polls: u64,
    /// Time spent waiting
    pub elapsed: Duration,
}

/// Bound and pacing of the completion wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Polls issued back-to-back before the first sleep
    pub spin_polls: u32,
    /// First sleep after the spin phase
    pub initial_backoff: Duration,
    /// Backoff doubles up to this ceiling
    pub max_backoff: Duration,
    /// Wall-clock bound; `None` waits forever
    pub timeout: Option<Duration>,
    /// Poll-count bound; `None` means unlimited
    pub max_polls: Option<u64>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            spin_polls: 64,
            initial_backoff: Duration::from_micros(10),
            max_backoff: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(1)),
            max_polls: None,
        }
    }
}

impl PollPolicy {
    /// Tight spin with no bound: blocks forever if the gateware never
    /// completes.
    pub const fn unbounded() -> Self {
        Self {
            spin_polls: u32::MAX,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            timeout: None,
            max_polls: None,
        }
    }

    /// Set the wall-clock bound
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the poll-count bound
    #[must_use]
    pub const fn with_max_polls(mut self, max_polls: u64) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Set the spin phase length
    #[must_use]
    pub const fn with_spin_polls(mut self, spin_polls: u32) -> Self {
        self.spin_polls = spin_polls;
        self
    }

    /// Set the backoff range
    #[must_use]
    pub const fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    fn expired(&self, polls: u64, elapsed: Duration) -> bool {
        self.max_polls.is_some_and(|max| polls >= max)
            || self.timeout.is_some_and(|limit| elapsed >= limit)
    }
}

/// Refresh trigger-outs and test the finished bit.
///
/// # Errors
///
/// Returns error if the transport fails.
pub fn poll_finished<T: Transport + ?Sized>(transport: &mut T) -> Result<bool> {
    poll_bit(transport, status::FINISHED)
}

/// Refresh trigger-outs and test the interrupt bit.
///
/// Trigger-outs are one-shot, so this refresh also consumes a pending
/// finished flag. Do not call it while a transaction is being awaited.
///
/// # Errors
///
/// Returns error if the transport fails.
pub fn poll_interrupt<T: Transport + ?Sized>(transport: &mut T) -> Result<bool> {
    poll_bit(transport, status::INTERRUPT)
}

/// Refresh trigger-outs once and read both status bits.
///
/// # Errors
///
/// Returns error if the transport fails.
pub fn poll_status<T: Transport + ?Sized>(transport: &mut T) -> Result<HandshakeStatus> {
    transport.refresh_trigger_status()?;
    Ok(HandshakeStatus {
        finished: transport.is_trigger_set(STATUS_TRIGGER, status::FINISHED)?,
        interrupt: transport.is_trigger_set(STATUS_TRIGGER, status::INTERRUPT)?,
    })
}

fn poll_bit<T: Transport + ?Sized>(transport: &mut T, bit: u8) -> Result<bool> {
    transport.refresh_trigger_status()?;
    transport.is_trigger_set(STATUS_TRIGGER, bit)
}

/// Poll until the finished bit asserts or `policy` expires.
///
/// # Errors
///
/// Returns [`WishboneError::Timeout`] when the bound expires, or the
/// transport's error if a poll fails. After a timeout the bus is in an
/// undefined state; reset before issuing further transactions.
pub fn wait_finished<T: Transport + ?Sized>(
    transport: &mut T,
    policy: &PollPolicy,
) -> Result<Completion> {
    let start = Instant::now();
    let mut polls: u64 = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        polls += 1;
        if poll_finished(transport)? {
            return Ok(Completion {
                polls,
                elapsed: start.elapsed(),
            });
        }

        let elapsed = start.elapsed();
        if policy.expired(polls, elapsed) {
            tracing::warn!("Handshake not finished after {polls} polls ({elapsed:?})");
            return Err(WishboneError::timeout(elapsed, polls));
        }

        if polls >= u64::from(policy.spin_polls) && !backoff.is_zero() {
            let nap = policy
                .timeout
                .map_or(backoff, |limit| backoff.min(limit.saturating_sub(elapsed)));
            std::thread::sleep(nap);
            backoff = backoff.saturating_mul(2).min(policy.max_backoff);
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedFpga;

    #[test]
    fn finished_after_latency() {
        let mut fpga = SimulatedFpga::new().with_latency(3);
        fpga.activate_trigger(okwb_regs::regs::CMD_TRIGGER, okwb_regs::regs::cmd::START_READ)
            .unwrap();
        let done = wait_finished(&mut fpga, &PollPolicy::default()).unwrap();
        assert_eq!(done.polls, 4);
    }

    #[test]
    fn poll_count_bound_expires() {
        let mut fpga = SimulatedFpga::new().stalled();
        fpga.activate_trigger(okwb_regs::regs::CMD_TRIGGER, okwb_regs::regs::cmd::START_READ)
            .unwrap();
        let policy = PollPolicy::default().with_max_polls(10);
        let err = wait_finished(&mut fpga, &policy).unwrap_err();
        assert!(matches!(err, WishboneError::Timeout { polls: 10, .. }));
    }

    #[test]
    fn wall_clock_bound_expires() {
        let mut fpga = SimulatedFpga::new().stalled();
        let policy = PollPolicy::default()
            .with_spin_polls(4)
            .with_timeout(Duration::from_millis(20));
        let start = Instant::now();
        let err = wait_finished(&mut fpga, &policy).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn huge_backoff_saturates() {
        let mut fpga = SimulatedFpga::new().stalled();
        let policy = PollPolicy::default()
            .with_spin_polls(0)
            .with_backoff(Duration::from_secs(u64::MAX / 2 + 1), Duration::MAX)
            .with_timeout(Duration::from_millis(20));
        let err = wait_finished(&mut fpga, &policy).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn status_reads_both_bits_from_one_refresh() {
        let mut fpga = SimulatedFpga::new();
        fpga.raise_interrupt();
        let status = poll_status(&mut fpga).unwrap();
        assert_eq!(
            status,
            HandshakeStatus {
                finished: false,
                interrupt: true
            }
        );
        // One-shot: the next refresh no longer sees it.
        assert!(!poll_interrupt(&mut fpga).unwrap());
    }

    #[test]
    fn link_down_propagates_immediately() {
        let mut fpga = SimulatedFpga::new();
        fpga.disconnect();
        let err = wait_finished(&mut fpga, &PollPolicy::unbounded()).unwrap_err();
        assert!(matches!(err, WishboneError::TransportUnavailable { .. }));
    }

    #[test]
    fn default_policy_is_bounded() {
        let policy = PollPolicy::default();
        assert!(policy.timeout.is_some());
        assert!(policy.initial_backoff <= policy.max_backoff);
        assert!(PollPolicy::unbounded().timeout.is_none());
    }
}
