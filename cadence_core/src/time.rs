// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host clock readings.
//!
//! Backends read the platform clock as [`HostTime`] ticks and convert them
//! with a [`Timebase`]. Links never see ticks: a tick source converts once,
//! to the `f64` seconds carried by [`Tick`](crate::tick::Tick).

use core::fmt;
use core::ops::Add;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Rational factor from host ticks to nanoseconds
/// (`nanos = ticks * numer / denom`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// Ticks are nanoseconds (`CLOCK_MONOTONIC`).
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Creates a timebase.
    ///
    /// # Panics
    ///
    /// Panics if either term is zero.
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(numer != 0 && denom != 0, "timebase terms must be non-zero");
        Self { numer, denom }
    }

    /// Ticks to nanoseconds, saturating at `u64::MAX`.
    #[must_use]
    pub const fn to_nanos(self, ticks: u64) -> u64 {
        saturate(ticks as u128 * self.numer as u128 / self.denom as u128)
    }

    /// Nanoseconds to ticks, saturating at `u64::MAX`.
    #[must_use]
    pub const fn from_nanos(self, nanos: u64) -> u64 {
        saturate(nanos as u128 * self.denom as u128 / self.numer as u128)
    }

    /// Ticks to seconds.
    #[must_use]
    pub fn to_secs(self, ticks: u64) -> f64 {
        self.to_nanos(ticks) as f64 / NANOS_PER_SECOND
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "checked against u64::MAX first"
)]
const fn saturate(wide: u128) -> u64 {
    if wide > u64::MAX as u128 {
        u64::MAX
    } else {
        wide as u64
    }
}

/// A reading of the host's monotonic clock, in native ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Raw tick value.
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// This reading in seconds.
    #[must_use]
    pub fn to_secs_f64(self, timebase: Timebase) -> f64 {
        timebase.to_secs(self.0)
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> HostDuration {
        HostDuration(self.0.saturating_sub(earlier.0))
    }

    /// `self + duration`, or `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, duration: HostDuration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(ticks) => Some(Self(ticks)),
            None => None,
        }
    }
}

/// Saturates at the end of the tick range.
impl Add<HostDuration> for HostTime {
    type Output = Self;

    fn add(self, rhs: HostDuration) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// A span of host clock ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostDuration(pub u64);

impl HostDuration {
    /// Zero ticks.
    pub const ZERO: Self = Self(0);

    /// A span of `nanos` nanoseconds in `timebase` ticks.
    #[must_use]
    pub const fn from_nanos(nanos: u64, timebase: Timebase) -> Self {
        Self(timebase.from_nanos(nanos))
    }

    /// This span in nanoseconds.
    #[must_use]
    pub const fn to_nanos(self, timebase: Timebase) -> u64 {
        timebase.to_nanos(self.0)
    }

    /// This span in seconds.
    #[must_use]
    pub fn as_secs_f64(self, timebase: Timebase) -> f64 {
        timebase.to_secs(self.0)
    }
}

impl fmt::Debug for HostDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostDuration({})", self.0)
    }
}
