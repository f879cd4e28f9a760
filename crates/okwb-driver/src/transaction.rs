//! Transaction descriptions and burst payload encoding
//!
//! A [`Transaction`] is a value: it names one bus operation and its
//! parameters, and has no identity beyond a single call to
//! [`WishboneMaster::execute`](crate::WishboneMaster::execute).

use crate::error::{Result, WishboneError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use okwb_regs::{mask_address, WORD_BYTES};
use std::fmt;

/// One bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Pulse the gateware reset and restore default wire-ins
    Reset,
    /// Read one word
    SingleRead {
        /// Bus address (masked to 16 bits)
        addr: u32,
    },
    /// Write one word
    SingleWrite {
        /// Bus address (masked to 16 bits)
        addr: u32,
        /// Data (masked to 16 bits)
        value: u32,
    },
    /// Read `count` consecutive words through the pipe-out channel
    BurstRead {
        /// Start address (masked to 16 bits)
        addr: u32,
        /// Words to read
        count: usize,
    },
    /// Write consecutive words through the pipe-in channel
    BurstWrite {
        /// Start address (masked to 16 bits)
        addr: u32,
        /// Payload, in bus order
        words: Vec<i16>,
    },
}

impl Transaction {
    /// Short name of the operation
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::SingleRead { .. } => "single-read",
            Self::SingleWrite { .. } => "single-write",
            Self::BurstRead { .. } => "burst-read",
            Self::BurstWrite { .. } => "burst-write",
        }
    }

    /// Bus address the operation targets, after masking
    pub const fn bus_address(&self) -> Option<u16> {
        match self {
            Self::Reset => None,
            Self::SingleRead { addr }
            | Self::SingleWrite { addr, .. }
            | Self::BurstRead { addr, .. }
            | Self::BurstWrite { addr, .. } => Some(mask_address(*addr)),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "reset"),
            Self::SingleRead { addr } => write!(f, "read [{:#06x}]", mask_address(*addr)),
            Self::SingleWrite { addr, value } => write!(
                f,
                "write [{:#06x}] <- {:#06x}",
                mask_address(*addr),
                okwb_regs::mask_data(*value)
            ),
            Self::BurstRead { addr, count } => {
                write!(f, "burst-read [{:#06x}] x{count}", mask_address(*addr))
            }
            Self::BurstWrite { addr, words } => {
                write!(f, "burst-write [{:#06x}] x{}", mask_address(*addr), words.len())
            }
        }
    }
}

/// Result of an executed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutput {
    /// Operation returns nothing
    None,
    /// Single read result
    Word(u16),
    /// Burst read result
    Words(Vec<i16>),
}

/// Where a transaction is in its sequence
///
/// ```text
/// Idle → AddressSet → Triggered → Polling → Complete → Idle
/// ```
///
/// Reset skips `AddressSet` and `Polling`. A failed transaction also returns
/// to `Idle`; the wires it had applied stay applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    /// Between transactions
    #[default]
    Idle,
    /// Address (and data) wire-ins committed
    AddressSet,
    /// Trigger pulsed or pipe transfer issued
    Triggered,
    /// Waiting for the finished handshake
    Polling,
    /// Handshake observed, results retrieved
    Complete,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::AddressSet => write!(f, "AddressSet"),
            Self::Triggered => write!(f, "Triggered"),
            Self::Polling => write!(f, "Polling"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// Byte length of a `count`-word burst
///
/// # Errors
///
/// Returns [`WishboneError::BurstTooLong`] if the length overflows.
pub fn burst_byte_len(count: usize) -> Result<usize> {
    count
        .checked_mul(WORD_BYTES)
        .ok_or(WishboneError::burst_too_long(count))
}

/// Reject byte lengths that are not a whole number of bus words
///
/// # Errors
///
/// Returns [`WishboneError::MalformedBurstLength`] for odd lengths.
pub fn check_burst_len(bytes: usize) -> Result<()> {
    if bytes % WORD_BYTES == 0 {
        Ok(())
    } else {
        Err(WishboneError::malformed_burst_length(bytes))
    }
}

/// Serialize words as little-endian `i16`, in order
pub fn encode_words(words: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(words.len() * WORD_BYTES);
    for &word in words {
        buf.put_i16_le(word);
    }
    buf.freeze()
}

/// Reinterpret a pipe payload as little-endian `i16` words, in order
///
/// # Errors
///
/// Returns [`WishboneError::MalformedBurstLength`] if the payload has an
/// odd number of bytes.
pub fn decode_words(mut bytes: &[u8]) -> Result<Vec<i16>> {
    check_burst_len(bytes.len())?;
    let mut words = Vec::with_capacity(bytes.len() / WORD_BYTES);
    while bytes.has_remaining() {
        words.push(bytes.get_i16_le());
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_little_endian() {
        let bytes = encode_words(&[0x0102, -1, 0]);
        assert_eq!(&bytes[..], &[0x02, 0x01, 0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn decode_preserves_receive_order() {
        let words = decode_words(&[0x00, 0x00, 0x01, 0x00, 0xFE, 0xFF]).unwrap();
        assert_eq!(words, vec![0, 1, -2]);
    }

    #[test]
    fn decode_rejects_odd_payloads() {
        assert!(matches!(
            decode_words(&[0x00, 0x01, 0x02]),
            Err(WishboneError::MalformedBurstLength { bytes: 3 })
        ));
    }

    #[test]
    fn empty_burst_is_legal() {
        assert!(encode_words(&[]).is_empty());
        assert!(decode_words(&[]).unwrap().is_empty());
        assert_eq!(burst_byte_len(0).unwrap(), 0);
    }

    #[test]
    fn burst_length_overflow_reports_word_count() {
        let words = usize::MAX / 2 + 1;
        assert!(matches!(
            burst_byte_len(words),
            Err(WishboneError::BurstTooLong { words: w }) if w == words
        ));
        assert_eq!(burst_byte_len(usize::MAX / 2).unwrap(), usize::MAX - 1);
        assert_eq!(burst_byte_len(4).unwrap(), 8);
    }

    #[test]
    fn display_masks_addresses() {
        let tx = Transaction::SingleWrite {
            addr: 0x1_0005,
            value: 0x1_00FF,
        };
        assert_eq!(tx.to_string(), "write [0x0005] <- 0x00ff");
        assert_eq!(tx.bus_address(), Some(5));
        assert_eq!(Transaction::Reset.bus_address(), None);
    }

    #[test]
    fn kind_names_each_operation() {
        assert_eq!(Transaction::Reset.kind(), "reset");
        assert_eq!(Transaction::SingleRead { addr: 0 }.kind(), "single-read");
        assert_eq!(
            Transaction::BurstWrite {
                addr: 0,
                words: vec![1]
            }
            .kind(),
            "burst-write"
        );
        assert_eq!(TransactionState::default(), TransactionState::Idle);
    }
}
