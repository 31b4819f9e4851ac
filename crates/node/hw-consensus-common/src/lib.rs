//! Common consensus utilities: protocol configuration and era timing.
//!
//! Every node computes era boundaries independently from the network-wide agreed [`HighwayConf`],
//! with no coordination round. The arithmetic here must therefore match bit-for-bit across nodes:
//! all of it is integer tick math (or chrono UTC calendar math, which is equally deterministic),
//! never floating point.

#![warn(rust_2018_idioms, missing_debug_implementations, missing_docs)]

#[cfg(test)]
mod tests;

use chrono::{DateTime, Months, TimeDelta, Utc};
use hw_core_primitives::tick::{Tick, TickDuration, TickUnit, Timestamp};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Calendar unit for the [`EraDuration::Calendar`] policy
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum CalendarUnit {
    /// Calendar seconds
    Seconds,
    /// Calendar minutes
    Minutes,
    /// Calendar hours
    Hours,
    /// Calendar days
    Days,
    /// Calendar weeks
    Weeks,
    /// Calendar months; day-of-month clamps to the last valid day of the target month
    Months,
    /// Calendar years; February 29th clamps to the 28th in non-leap years
    Years,
}

/// How an era's end tick is derived from its start tick
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum EraDuration {
    /// Every era is the same constant number of ticks long
    FixedLength {
        /// Era length in ticks
        ticks: TickDuration,
    },
    /// Era end is computed by calendar-aware addition in UTC; eras are not required to be of
    /// equal length under this policy
    Calendar {
        /// How many calendar units one era spans
        length: u32,
        /// The calendar unit
        unit: CalendarUnit,
    },
}

/// How long validators keep producing ballots after an era has ended
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum VotingDuration {
    /// Ballots are produced for a fixed tick duration after era end
    FixedLength {
        /// Voting period length in ticks
        ticks: TickDuration,
    },
    /// Ballots are produced until a summit of the given level is reached on the switch block
    SummitLevel {
        /// Required summit level
        level: u8,
    },
}

/// Error for [`HighwayConf::new()`].
///
/// All variants are fatal: the configuration is a network-wide agreed value and a node must
/// refuse to run with a broken one rather than silently compute nonsensical boundaries.
#[derive(Debug, thiserror::Error)]
pub enum HighwayConfError {
    /// Entropy duration exceeds booking duration, the key block offset would be negative
    #[error(
        "Entropy duration ({entropy_ticks} ticks) exceeds booking duration ({booking_ticks} \
        ticks), the key block offset would be negative"
    )]
    EntropyExceedsBooking {
        /// Configured booking duration
        booking_ticks: TickDuration,
        /// Configured entropy duration
        entropy_ticks: TickDuration,
    },
    /// Era length is zero
    #[error("Era length is zero")]
    ZeroEraLength,
}

/// Immutable protocol configuration: tick unit, era duration policy and critical boundary
/// offsets.
///
/// Constructed once at node startup from network-wide agreed parameters and shared read-only by
/// all components; all methods are pure and safe to call concurrently.
// No serde derives here on purpose: deserializing would bypass the validation in
// `HighwayConf::new()`; config-loading consumers deserialize the individual parameters and
// construct through `new()`
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HighwayConf {
    tick_unit: TickUnit,
    genesis_era_start: Timestamp,
    era_duration: EraDuration,
    booking_ticks: TickDuration,
    entropy_ticks: TickDuration,
    post_era_voting_duration: VotingDuration,
}

impl HighwayConf {
    /// Create a new instance, validating the parameters.
    ///
    /// * `tick_unit` is the time unit of all tick arithmetic.
    /// * `genesis_era_start` is the wall-clock start of the genesis era.
    /// * `era_duration` derives an era's end tick from its start tick.
    /// * `booking_ticks` is how long before an era's start its booking block is produced.
    /// * `entropy_ticks` is how long after the booking block entropy is collected for the key
    ///   block; must not exceed `booking_ticks`.
    /// * `post_era_voting_duration` is how long ballots keep being produced after era end.
    pub fn new(
        tick_unit: TickUnit,
        genesis_era_start: Timestamp,
        era_duration: EraDuration,
        booking_ticks: TickDuration,
        entropy_ticks: TickDuration,
        post_era_voting_duration: VotingDuration,
    ) -> Result<Self, HighwayConfError> {
        if entropy_ticks > booking_ticks {
            return Err(HighwayConfError::EntropyExceedsBooking {
                booking_ticks,
                entropy_ticks,
            });
        }

        match era_duration {
            EraDuration::FixedLength { ticks } if ticks.is_zero() => {
                return Err(HighwayConfError::ZeroEraLength);
            }
            EraDuration::Calendar { length: 0, .. } => {
                return Err(HighwayConfError::ZeroEraLength);
            }
            _ => {}
        }

        Ok(Self {
            tick_unit,
            genesis_era_start,
            era_duration,
            booking_ticks,
            entropy_ticks,
            post_era_voting_duration,
        })
    }

    /// The time unit of all tick arithmetic
    #[inline(always)]
    pub const fn tick_unit(&self) -> TickUnit {
        self.tick_unit
    }

    /// Wall-clock start of the genesis era
    #[inline(always)]
    pub const fn genesis_era_start(&self) -> Timestamp {
        self.genesis_era_start
    }

    /// Era duration policy
    #[inline(always)]
    pub const fn era_duration(&self) -> EraDuration {
        self.era_duration
    }

    /// Booking block offset: how long before an era's start its booking block is produced
    #[inline(always)]
    pub const fn booking_ticks(&self) -> TickDuration {
        self.booking_ticks
    }

    /// Entropy collection duration after the booking block
    #[inline(always)]
    pub const fn entropy_ticks(&self) -> TickDuration {
        self.entropy_ticks
    }

    /// Post-era voting duration policy
    #[inline(always)]
    pub const fn post_era_voting_duration(&self) -> VotingDuration {
        self.post_era_voting_duration
    }

    /// Convert a wall-clock timestamp to ticks
    #[inline]
    pub fn to_ticks(&self, timestamp: Timestamp) -> Tick {
        self.tick_unit.ticks_from_timestamp(timestamp)
    }

    /// Convert a tick back to a wall-clock timestamp
    #[inline]
    pub fn to_timestamp(&self, tick: Tick) -> Timestamp {
        self.tick_unit.timestamp_from_ticks(tick)
    }

    /// First tick of the genesis era
    #[inline]
    pub fn genesis_era_start_tick(&self) -> Tick {
        self.to_ticks(self.genesis_era_start)
    }

    /// Key block offset: how long before an era's start its key block is produced.
    ///
    /// Non-negative by construction (`booking_ticks >= entropy_ticks`).
    #[inline]
    pub fn key_ticks(&self) -> TickDuration {
        self.booking_ticks
            .checked_sub(self.entropy_ticks)
            .expect("Validated at construction: booking_ticks >= entropy_ticks; qed")
    }

    /// End tick of an era starting at `start`.
    ///
    /// With [`EraDuration::Calendar`] consecutive eras are generally not of equal length;
    /// consumers must tolerate that.
    ///
    /// # Panics
    /// If tick arithmetic overflows, or if the configured duration is shorter than one tick at
    /// the configured unit. Both mean the network-wide configuration is broken, which a node must
    /// not paper over.
    pub fn era_end(&self, start: Tick) -> Tick {
        let end = match self.era_duration {
            EraDuration::FixedLength { ticks } => start
                .checked_add(ticks)
                .expect("Era end tick must not overflow"),
            EraDuration::Calendar { length, unit } => {
                let start_millis = i64::try_from(self.to_timestamp(start).as_millis())
                    .expect("Tick timestamps are within the representable datetime range");
                let datetime = DateTime::<Utc>::from_timestamp_millis(start_millis)
                    .expect("Tick timestamps are within the representable datetime range");

                let end_datetime = match unit {
                    CalendarUnit::Seconds => {
                        datetime.checked_add_signed(TimeDelta::seconds(i64::from(length)))
                    }
                    CalendarUnit::Minutes => {
                        datetime.checked_add_signed(TimeDelta::minutes(i64::from(length)))
                    }
                    CalendarUnit::Hours => {
                        datetime.checked_add_signed(TimeDelta::hours(i64::from(length)))
                    }
                    CalendarUnit::Days => {
                        datetime.checked_add_signed(TimeDelta::days(i64::from(length)))
                    }
                    CalendarUnit::Weeks => {
                        datetime.checked_add_signed(TimeDelta::weeks(i64::from(length)))
                    }
                    CalendarUnit::Months => datetime.checked_add_months(Months::new(length)),
                    CalendarUnit::Years => datetime.checked_add_months(Months::new(
                        length
                            .checked_mul(12)
                            .expect("Era length in months must not overflow"),
                    )),
                }
                .expect("Era end is within the representable datetime range");

                let end_millis = u64::try_from(end_datetime.timestamp_millis())
                    .expect("Era end does not precede the epoch");
                self.to_ticks(Timestamp::from_millis(end_millis))
            }
        };

        // A configuration whose era duration rounds down to zero ticks would make the boundary
        // walks below loop forever
        assert!(
            end > start,
            "Era duration must be at least one tick at the configured tick unit"
        );

        end
    }

    /// End tick of the genesis era.
    ///
    /// A regular era looks `booking_ticks` back in time for its booking block, and the era right
    /// after genesis has no earlier era to look into, so the genesis era is extended to cover the
    /// lookback: the normal one-era end is pushed further by whole eras until at least
    /// `1 + booking_ticks / era_length` era lengths of runway exist.
    pub fn genesis_era_end(&self) -> Tick {
        let start = self.genesis_era_start_tick();
        let end = self.era_end(start);
        let length = end
            .checked_duration_since(start)
            .expect("Era end is always after its start; qed");

        let multiplier = 1 + self.booking_ticks.as_u64() / length.as_u64();
        (1..multiplier).fold(end, |end, _| self.era_end(end))
    }

    /// Critical boundary ticks within the era `[start_tick, end_tick)`: the ticks at which blocks
    /// relevant to eras-being-born are produced.
    ///
    /// Walks forward era-by-era from `end_tick` (the first upcoming era start) and emits
    /// `upcoming_era_start - delay_ticks` for every upcoming era whose boundary falls within this
    /// era, in chronological order. Boundaries that would precede the epoch are skipped but the
    /// walk continues, so a `delay_ticks` spanning multiple era lengths never skips an era.
    pub fn critical_boundaries(
        &self,
        start_tick: Tick,
        end_tick: Tick,
        delay_ticks: TickDuration,
    ) -> Vec<Tick> {
        let mut boundaries = Vec::new();
        let mut upcoming_era_start = end_tick;

        loop {
            if let Some(boundary) = upcoming_era_start.checked_sub(delay_ticks) {
                if boundary >= end_tick {
                    break;
                }
                if boundary >= start_tick {
                    boundaries.push(boundary);
                }
            }
            upcoming_era_start = self.era_end(upcoming_era_start);
        }

        boundaries
    }

    /// Booking block boundaries within the era `[start_tick, end_tick)`.
    ///
    /// The genesis era, being extended, contains booking boundaries for several upcoming eras;
    /// regular eras typically contain one.
    #[inline]
    pub fn booking_boundaries(&self, start_tick: Tick, end_tick: Tick) -> Vec<Tick> {
        self.critical_boundaries(start_tick, end_tick, self.booking_ticks)
    }

    /// Key block boundaries within the era `[start_tick, end_tick)`
    #[inline]
    pub fn key_boundaries(&self, start_tick: Tick, end_tick: Tick) -> Vec<Tick> {
        self.critical_boundaries(start_tick, end_tick, self.key_ticks())
    }
}
