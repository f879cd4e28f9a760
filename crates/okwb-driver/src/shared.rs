//! Thread-safe handle to one Wishbone master
//!
//! Each method holds the lock for exactly one transaction, so two threads
//! can never interleave wire-in writes. Use [`SharedMaster::with`] when a
//! sequence of transactions must run back-to-back.

use crate::error::Result;
use crate::master::WishboneMaster;
use crate::transaction::{Transaction, TransactionOutput};
use crate::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable, lock-protected [`WishboneMaster`]
#[derive(Debug)]
pub struct SharedMaster<T> {
    inner: Arc<Mutex<WishboneMaster<T>>>,
}

impl<T> Clone for SharedMaster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SharedMaster<T> {
    /// Share `master`
    pub fn new(master: WishboneMaster<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(master)),
        }
    }

    // A panic mid-transaction leaves the bus as applied, which is the same
    // contract as an error return.
    fn lock(&self) -> MutexGuard<'_, WishboneMaster<T>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run `f` with exclusive access to the master
    pub fn with<R>(&self, f: impl FnOnce(&mut WishboneMaster<T>) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`WishboneMaster::reset`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn reset(&self) -> Result<()> {
        self.lock().reset()
    }

    /// See [`WishboneMaster::single_read`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the handshake times out.
    pub fn single_read(&self, addr: u32) -> Result<u16> {
        self.lock().single_read(addr)
    }

    /// See [`WishboneMaster::single_write`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the handshake times out.
    pub fn single_write(&self, addr: u32, value: u32) -> Result<()> {
        self.lock().single_write(addr, value)
    }

    /// See [`WishboneMaster::burst_read`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the handshake times out.
    pub fn burst_read(&self, addr: u32, count: usize) -> Result<Vec<i16>> {
        self.lock().burst_read(addr, count)
    }

    /// See [`WishboneMaster::burst_write`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the handshake times out.
    pub fn burst_write(&self, addr: u32, words: &[i16]) -> Result<()> {
        self.lock().burst_write(addr, words)
    }

    /// See [`WishboneMaster::read_debug`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn read_debug(&self) -> Result<u16> {
        self.lock().read_debug()
    }

    /// See [`WishboneMaster::is_interrupt`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn is_interrupt(&self) -> Result<bool> {
        self.lock().is_interrupt()
    }

    /// See [`WishboneMaster::execute`].
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation.
    pub fn execute(&self, transaction: &Transaction) -> Result<TransactionOutput> {
        self.lock().execute(transaction)
    }

    /// Take the master back if this is the last handle
    pub fn try_unwrap(self) -> std::result::Result<WishboneMaster<T>, Self> {
        Arc::try_unwrap(self.inner)
            .map(|mutex| match mutex.into_inner() {
                Ok(master) => master,
                Err(poisoned) => poisoned.into_inner(),
            })
            .map_err(|inner| Self { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedFpga;
    use crate::master::MasterConfig;
    use std::time::Duration;

    fn shared() -> SharedMaster<SimulatedFpga> {
        let config = MasterConfig::default().with_reset_settle(Duration::ZERO);
        SharedMaster::new(WishboneMaster::with_config(
            SimulatedFpga::new().with_latency(2),
            config,
        ))
    }

    #[test]
    fn threads_do_not_corrupt_address_data_pairs() {
        let master = shared();
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let m = master.clone();
                std::thread::spawn(move || {
                    for i in 0..64u32 {
                        let addr = t * 0x100 + i;
                        m.single_write(addr, addr ^ 0x5A5A).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for t in 0..4u32 {
            for i in 0..64u32 {
                let addr = t * 0x100 + i;
                assert_eq!(
                    u32::from(master.single_read(addr).unwrap()),
                    addr ^ 0x5A5A
                );
            }
        }
    }

    #[test]
    fn with_runs_sequences_atomically() {
        let master = shared();
        let words = master
            .with(|m| -> Result<Vec<i16>> {
                m.burst_write(0x40, &[9, 8, 7])?;
                m.burst_read(0x40, 3)
            })
            .unwrap();
        assert_eq!(words, vec![9, 8, 7]);
    }

    #[test]
    fn last_handle_unwraps() {
        let master = shared();
        let other = master.clone();
        let master = master.try_unwrap().unwrap_err();
        drop(other);
        let inner = master.try_unwrap().unwrap();
        assert_eq!(inner.transport().stats().transactions, 0);
    }
}
