//! Point in time as reported by the FPGA capture unit

use core::fmt::Display;

/// Nanoseconds in one second
pub const NSEC_PER_SEC: u128 = 1_000_000_000;

/// A hardware timestamp, in nanoseconds since the epoch of the capture unit.
///
/// The capture unit reports 48 bits of seconds, which does not fit a 64 bit
/// nanosecond counter, so the value is kept as a `u128` and every conversion
/// from the wire representation is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    nanos: u128,
}

impl Time {
    /// Combine whole seconds and a nanosecond part.
    ///
    /// `nanos` is not required to be below one second, it is simply added.
    pub const fn from_parts(seconds: u64, nanos: u32) -> Self {
        Time {
            nanos: seconds as u128 * NSEC_PER_SEC + nanos as u128,
        }
    }

    pub const fn from_nanos(nanos: u128) -> Self {
        Time { nanos }
    }

    /// Total nanoseconds since the epoch
    pub const fn nanos(&self) -> u128 {
        self.nanos
    }

    /// Whole seconds since the epoch
    pub const fn secs(&self) -> u128 {
        self.nanos / NSEC_PER_SEC
    }

    /// Nanoseconds past the last whole second
    pub const fn subsec_nanos(&self) -> u32 {
        (self.nanos % NSEC_PER_SEC) as u32
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.secs(), self.subsec_nanos())
    }
}
