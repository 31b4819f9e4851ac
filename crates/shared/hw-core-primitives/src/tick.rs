//! Tick-related data structures and conversions.
//!
//! The protocol's internal clock is a [`Tick`]: an integer count of a configured time unit
//! ([`TickUnit`]) since the Unix epoch. All era boundary math is done in ticks so that every node
//! derives bit-identical boundaries from the same configuration.

use core::num::NonZeroU64;
use core::time::Duration;
use derive_more::{Display, From, Into};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NANOS_PER_MILLI: u128 = 1_000_000;

/// Wall-clock timestamp, milliseconds since the Unix epoch
#[derive(
    Debug, Display, Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, From, Into,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp of the Unix epoch itself
    pub const ZERO: Self = Self(0);

    /// Create new instance
    #[inline(always)]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Get internal representation
    #[inline(always)]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Checked addition of a duration, truncated to whole milliseconds, returning `None` if
    /// overflow occurred
    #[inline]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        // `Duration::as_millis()` returns `u128`, the sum is checked after narrowing
        let millis = duration.as_millis();
        if millis > u64::MAX as u128 {
            return None;
        }
        match self.0.checked_add(millis as u64) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Checked subtraction of a duration, truncated to whole milliseconds, returning `None` if
    /// the result would precede the epoch
    #[inline]
    pub const fn checked_sub(self, duration: Duration) -> Option<Self> {
        let millis = duration.as_millis();
        if millis > u64::MAX as u128 {
            return None;
        }
        match self.0.checked_sub(millis as u64) {
            Some(diff) => Some(Self(diff)),
            None => None,
        }
    }
}

/// Tick number, a count of [`TickUnit`]s since the Unix epoch
#[derive(
    Debug, Display, Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, From, Into,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct Tick(u64);

impl Tick {
    /// Tick 0
    pub const ZERO: Self = Self(0);
    /// Max tick
    pub const MAX: Self = Self(u64::MAX);

    /// Create new instance
    #[inline(always)]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get internal representation
    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checked addition of a tick duration, returning `None` if overflow occurred
    #[inline]
    pub const fn checked_add(self, duration: TickDuration) -> Option<Self> {
        match self.0.checked_add(duration.as_u64()) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Checked subtraction of a tick duration, returning `None` if the result would precede the
    /// epoch
    #[inline]
    pub const fn checked_sub(self, duration: TickDuration) -> Option<Self> {
        match self.0.checked_sub(duration.as_u64()) {
            Some(diff) => Some(Self(diff)),
            None => None,
        }
    }

    /// Duration since an earlier tick, `None` if `earlier` is actually later
    #[inline]
    pub const fn checked_duration_since(self, earlier: Self) -> Option<TickDuration> {
        match self.0.checked_sub(earlier.0) {
            Some(diff) => Some(TickDuration::new(diff)),
            None => None,
        }
    }
}

/// Duration expressed as a number of [`TickUnit`]s
#[derive(
    Debug, Display, Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, From, Into,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct TickDuration(u64);

impl TickDuration {
    /// Zero-length duration
    pub const ZERO: Self = Self(0);

    /// Create new instance
    #[inline(always)]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get internal representation
    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the duration is zero ticks long
    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition, returning `None` if overflow occurred
    #[inline]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Checked subtraction, returning `None` if `rhs` is longer than `self`
    #[inline]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(diff) => Some(Self(diff)),
            None => None,
        }
    }

    /// Saturating multiplication by a scalar
    #[inline]
    pub const fn saturating_mul(self, rhs: u64) -> Self {
        Self(self.0.saturating_mul(rhs))
    }
}

/// The time unit one tick corresponds to, stored as nanoseconds per tick.
///
/// Conversions between [`Timestamp`]s and [`Tick`]s truncate toward the unit's resolution and go
/// through a `u128` nanosecond intermediate, which keeps them exact for timestamps several
/// centuries away from the epoch even at sub-second units.
#[derive(Debug, Display, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, From, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct TickUnit(NonZeroU64);

impl TickUnit {
    /// One tick per millisecond
    pub const MILLISECONDS: Self = Self(NonZeroU64::new(1_000_000).expect("Not zero; qed"));
    /// One tick per second
    pub const SECONDS: Self = Self(NonZeroU64::new(1_000_000_000).expect("Not zero; qed"));
    /// One tick per minute
    pub const MINUTES: Self = Self(NonZeroU64::new(60_000_000_000).expect("Not zero; qed"));

    /// Create new instance from nanoseconds per tick
    #[inline(always)]
    pub const fn from_nanos(nanos: NonZeroU64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds per tick
    #[inline(always)]
    pub const fn as_nanos(self) -> u64 {
        self.0.get()
    }

    /// Convert a wall-clock timestamp into the tick it falls into, truncating toward the unit's
    /// resolution
    #[inline]
    pub fn ticks_from_timestamp(self, timestamp: Timestamp) -> Tick {
        let nanos = u128::from(timestamp.as_millis()) * NANOS_PER_MILLI;
        let ticks = nanos / u128::from(self.as_nanos());
        Tick::new(
            u64::try_from(ticks)
                .expect("Tick counts fit into 64 bits for all supported timestamp ranges"),
        )
    }

    /// Convert a tick back into the wall-clock timestamp of its beginning.
    ///
    /// `timestamp_from_ticks(ticks_from_timestamp(t))` equals `t` truncated to this unit's
    /// resolution.
    #[inline]
    pub fn timestamp_from_ticks(self, tick: Tick) -> Timestamp {
        let nanos = u128::from(tick.as_u64()) * u128::from(self.as_nanos());
        let millis = nanos / NANOS_PER_MILLI;
        Timestamp::from_millis(
            u64::try_from(millis)
                .expect("Millisecond counts fit into 64 bits for all supported tick ranges"),
        )
    }

    /// Express a wall-clock duration as a whole number of ticks, truncating
    #[inline]
    pub fn duration_to_ticks(self, duration: Duration) -> TickDuration {
        let ticks = duration.as_nanos() / u128::from(self.as_nanos());
        TickDuration::new(
            u64::try_from(ticks)
                .expect("Tick counts fit into 64 bits for all supported duration ranges"),
        )
    }
}
