//! Session tokens.
//!
//! A token is the only handle the controller may use to address a debugging
//! session. Guest-assigned process and thread ids are never trusted for
//! command routing.

use core::fmt;

/// Number of low bits holding the arena slot.
pub const SLOT_BITS: u32 = 20;

/// Largest arena a token can address.
pub const MAX_SLOTS: usize = 1 << SLOT_BITS;

const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;

/// Activation epochs wrap at this many.
pub const EPOCH_MASK: u32 = (1 << (32 - SLOT_BITS)) - 1;

/// Opaque, generation-checked session handle.
///
/// Layout of the raw value, high to low: 32 bits of serial drawn from the
/// registry's seed counter, 12 bits of activation epoch, 20 bits of arena
/// slot. A token whose slot was recycled for a newer session fails the serial
/// comparison; a token from an earlier activation fails the epoch comparison.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(u64);

impl Token {
    /// The null token. Never issued for a live session.
    pub const NULL: Token = Token(0);

    pub(crate) fn new(serial: u32, epoch: u32, slot: u32) -> Self {
        debug_assert!((slot as u64) <= SLOT_MASK);
        let epoch = (epoch & EPOCH_MASK) as u64;
        Self(((serial as u64) << 32) | (epoch << SLOT_BITS) | (slot as u64 & SLOT_MASK))
    }

    /// Rebuild a token received across the privilege boundary.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value suitable for the wire.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Serial number assigned at session creation.
    pub const fn serial(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Activation the token was issued in.
    pub const fn epoch(&self) -> u32 {
        (self.0 as u32) >> SLOT_BITS
    }

    /// Arena slot index.
    pub const fn slot(&self) -> u32 {
        (self.0 & SLOT_MASK) as u32
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
