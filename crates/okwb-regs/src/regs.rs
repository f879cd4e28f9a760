//! Endpoint map of the Wishbone master gateware.
//!
//! FrontPanel endpoint address ranges are fixed by the host interface:
//!
//! ```text
//! 0x00-0x1f  wire-in      host → FPGA, staged then committed together
//! 0x20-0x3f  wire-out     FPGA → host, latched on refresh
//! 0x40-0x5f  trigger-in   host → FPGA, one-shot pulses
//! 0x60-0x7f  trigger-out  FPGA → host, one-shot flags latched on refresh
//! 0x80-0x9f  pipe-in      host → FPGA byte stream
//! 0xa0-0xbf  pipe-out     FPGA → host byte stream
//! ```

// ── Wire-ins ─────────────────────────────────────────────────────────────────

/// Target bus address for the next transaction (16 bits).
pub const ADDR_WIRE: u8 = 0x00;

/// Data value for a single write.
pub const DATA_WIRE: u8 = 0x01;

// ── Wire-outs ────────────────────────────────────────────────────────────────

/// Result of the last single read.
pub const DATA_OUT_WIRE: u8 = 0x20;

/// Free-running debug/status word driven by the gateware.
pub const DEBUG_WIRE: u8 = 0x21;

// ── Triggers ─────────────────────────────────────────────────────────────────

/// Command trigger-in register.
pub const CMD_TRIGGER: u8 = 0x40;

/// Status trigger-out register.
pub const STATUS_TRIGGER: u8 = 0x60;

// ── Pipes ────────────────────────────────────────────────────────────────────

/// Burst write payload channel.
pub const PIPE_IN: u8 = 0x80;

/// Burst read payload channel. Reading from it also starts the burst.
pub const PIPE_OUT: u8 = 0xa0;

// ── Bus geometry ─────────────────────────────────────────────────────────────

/// Significant bits of a bus address.
pub const ADDRESS_MASK: u32 = 0xFFFF;

/// Bytes per bus word on the pipes (little-endian `i16`).
pub const WORD_BYTES: usize = 2;

/// Number of addressable words on the bus.
pub const BUS_WORDS: usize = 1 << 16;

/// Truncate a host-side address to the 16-bit bus address.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn mask_address(addr: u32) -> u16 {
    (addr & ADDRESS_MASK) as u16
}

/// Truncate a host-side value to the 16-bit data wire.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn mask_data(value: u32) -> u16 {
    (value & 0xFFFF) as u16
}

// ── Command trigger bit definitions ──────────────────────────────────────────

/// Bit numbers within [`CMD_TRIGGER`].
pub mod cmd {
    /// Reset the Wishbone system.
    pub const RESET: u8 = 0;
    /// Start a single read at `ADDR_WIRE`.
    pub const START_READ: u8 = 1;
    /// Start a single write of `DATA_WIRE` to `ADDR_WIRE`.
    pub const START_WRITE: u8 = 2;
}

// ── Status trigger bit definitions ───────────────────────────────────────────

/// Bit numbers within [`STATUS_TRIGGER`].
pub mod status {
    /// The current transaction has completed.
    pub const FINISHED: u8 = 1;
    /// A slave on the bus raised an interrupt.
    pub const INTERRUPT: u8 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_sit_in_their_frontpanel_ranges() {
        assert!(ADDR_WIRE < 0x20 && DATA_WIRE < 0x20);
        assert!((0x20..0x40).contains(&DATA_OUT_WIRE));
        assert!((0x20..0x40).contains(&DEBUG_WIRE));
        assert!((0x40..0x60).contains(&CMD_TRIGGER));
        assert!((0x60..0x80).contains(&STATUS_TRIGGER));
        assert!((0x80..0xa0).contains(&PIPE_IN));
        assert!((0xa0..0xc0).contains(&PIPE_OUT));
    }

    #[test]
    fn trigger_bits_are_distinct() {
        assert_ne!(cmd::RESET, cmd::START_READ);
        assert_ne!(cmd::START_READ, cmd::START_WRITE);
        assert_ne!(status::FINISHED, status::INTERRUPT);
    }

    #[test]
    fn address_masking_wraps() {
        assert_eq!(mask_address(0), 0);
        assert_eq!(mask_address(0xFFFF), 0xFFFF);
        assert_eq!(mask_address(0x1_0000), 0);
        assert_eq!(mask_address(0xDEAD_BEEF), 0xBEEF);
        assert_eq!(mask_address(u32::MAX), 0xFFFF);
    }

    #[test]
    fn address_mask_matches_bus_size() {
        for addr in (0u32..=0x3_0000).step_by(0x1111) {
            assert_eq!(u32::from(mask_address(addr)), addr & ADDRESS_MASK);
            assert!(usize::from(mask_address(addr)) < BUS_WORDS);
        }
    }

    #[test]
    fn data_masking_keeps_low_half() {
        assert_eq!(mask_data(0x00FF), 0x00FF);
        assert_eq!(mask_data(0x1_2345), 0x2345);
    }
}
