//! Validator identity and stake weight.

use derive_more::{Display, From, Into};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Compact validator identity within an era.
///
/// Indices are assigned by the era's weight table and are only meaningful relative to that era.
#[derive(
    Debug, Display, Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, From, Into,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct ValidatorIndex(u32);

impl ValidatorIndex {
    /// Create new instance
    #[inline(always)]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    /// Get internal representation
    #[inline(always)]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Validator stake weight.
///
/// Weights are compared and summed as integers, never as floats; cumulative sums across a whole
/// weight table must be done in `u128` (see [`Weight::as_u128()`]) so they can't overflow.
#[derive(
    Debug, Display, Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, From, Into,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct Weight(u64);

impl Weight {
    /// Zero weight
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

    /// Widened representation for overflow-free accumulation
    #[inline(always)]
    pub const fn as_u128(self) -> u128 {
        self.0 as u128
    }

    /// Whether the weight is zero
    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}
