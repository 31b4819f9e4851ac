use crate::{CalendarUnit, EraDuration, HighwayConf, HighwayConfError, VotingDuration};
use chrono::{TimeZone, Utc};
use hw_core_primitives::tick::{Tick, TickDuration, TickUnit, Timestamp};

const MILLIS_PER_DAY: u64 = 24 * 3_600 * 1_000;

fn days(n: u64) -> TickDuration {
    TickDuration::new(n * MILLIS_PER_DAY)
}

fn day_tick(n: u64) -> Tick {
    Tick::new(n * MILLIS_PER_DAY)
}

/// Weekly eras in milliseconds, booking 10 days, entropy 1 day
fn weekly_conf() -> HighwayConf {
    HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::ZERO,
        EraDuration::FixedLength { ticks: days(7) },
        days(10),
        days(1),
        VotingDuration::FixedLength { ticks: days(2) },
    )
    .unwrap()
}

#[test]
fn entropy_longer_than_booking_is_rejected() {
    let result = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::ZERO,
        EraDuration::FixedLength { ticks: days(7) },
        days(1),
        days(10),
        VotingDuration::SummitLevel { level: 1 },
    );

    assert!(matches!(
        result,
        Err(HighwayConfError::EntropyExceedsBooking { .. })
    ));
}

#[test]
fn zero_length_eras_are_rejected() {
    let result = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::ZERO,
        EraDuration::FixedLength {
            ticks: TickDuration::ZERO,
        },
        days(10),
        days(1),
        VotingDuration::SummitLevel { level: 1 },
    );
    assert!(matches!(result, Err(HighwayConfError::ZeroEraLength)));

    let result = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::ZERO,
        EraDuration::Calendar {
            length: 0,
            unit: CalendarUnit::Weeks,
        },
        days(10),
        days(1),
        VotingDuration::SummitLevel { level: 1 },
    );
    assert!(matches!(result, Err(HighwayConfError::ZeroEraLength)));
}

#[test]
fn fixed_length_era_end_is_exact_addition() {
    let conf = weekly_conf();

    assert_eq!(conf.era_end(Tick::ZERO), day_tick(7));
    assert_eq!(conf.era_end(day_tick(7)), day_tick(14));
    assert_eq!(conf.era_end(Tick::new(123_456)), Tick::new(123_456 + 7 * MILLIS_PER_DAY));
}

#[test]
fn key_offset_is_booking_minus_entropy() {
    assert_eq!(weekly_conf().key_ticks(), days(9));
}

#[test]
fn genesis_era_covers_the_booking_lookback() {
    let conf = weekly_conf();
    let genesis_start = conf.genesis_era_start_tick();
    let genesis_end = conf.genesis_era_end();

    // 10-day booking with 7-day eras extends genesis to two era lengths
    assert_eq!(genesis_end, day_tick(14));
    assert!(genesis_end > conf.era_end(genesis_start));

    // The era right after genesis finds its booking boundary inside genesis
    let first_era_booking = genesis_end.checked_sub(conf.booking_ticks()).unwrap();
    assert!(first_era_booking >= genesis_start);
    assert!(first_era_booking < genesis_end);
}

#[test]
fn genesis_booking_boundaries_seed_the_upcoming_eras() {
    let conf = weekly_conf();
    let genesis_end = conf.genesis_era_end();

    // Eras start at days 14, 21, 28, ...; their booking boundaries land at days 4 and 11, after
    // which boundaries fall outside genesis
    assert_eq!(
        conf.booking_boundaries(Tick::ZERO, genesis_end),
        vec![day_tick(4), day_tick(11)]
    );
    // Key boundaries are `entropy_ticks` later
    assert_eq!(
        conf.key_boundaries(Tick::ZERO, genesis_end),
        vec![day_tick(5), day_tick(12)]
    );
}

#[test]
fn regular_era_has_one_booking_boundary() {
    let conf = weekly_conf();

    // Era [14 d, 21 d): upcoming eras start at days 21, 28; boundaries at days 11 (before this
    // era) and 18
    assert_eq!(
        conf.booking_boundaries(day_tick(14), day_tick(21)),
        vec![day_tick(18)]
    );
}

#[test]
fn critical_boundaries_are_ordered_and_in_range() {
    let conf = weekly_conf();

    for delay in [TickDuration::ZERO, days(1), days(7), days(10), days(25)] {
        let start = day_tick(14);
        let end = day_tick(35);
        let boundaries = conf.critical_boundaries(start, end, delay);

        assert!(boundaries.is_sorted(), "{delay}");
        for boundary in &boundaries {
            assert!(*boundary >= start && *boundary < end, "{delay}, {boundary}");
        }

        // Exactly the upcoming-era starts shifted back by `delay` and filtered to the range
        let expected = (5..)
            .map(|era| day_tick(7 * era))
            .take_while(|upcoming_start| {
                upcoming_start.checked_sub(delay).is_none_or(|b| b < end)
            })
            .filter_map(|upcoming_start| upcoming_start.checked_sub(delay))
            .filter(|boundary| *boundary >= start)
            .collect::<Vec<_>>();
        assert_eq!(boundaries, expected, "{delay}");
    }
}

#[test]
fn delay_spanning_multiple_eras_skips_no_era() {
    // 2-day eras with a 7-day delay: boundaries exist for every upcoming era even though the
    // delay reaches several eras back
    let conf = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::ZERO,
        EraDuration::FixedLength { ticks: days(2) },
        days(7),
        days(1),
        VotingDuration::SummitLevel { level: 1 },
    )
    .unwrap();

    assert_eq!(
        conf.critical_boundaries(Tick::ZERO, day_tick(2), days(7)),
        vec![day_tick(1)]
    );
    assert_eq!(
        conf.critical_boundaries(day_tick(2), day_tick(4), days(7)),
        vec![day_tick(3)]
    );
    // One boundary per upcoming era starting at days 10, 12, 14 and 16; none lost
    let all = conf.critical_boundaries(Tick::ZERO, day_tick(10), days(7));
    assert_eq!(
        all,
        vec![day_tick(3), day_tick(5), day_tick(7), day_tick(9)]
    );
}

#[test]
fn calendar_month_addition_clamps_to_month_end() {
    let genesis = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
    let conf = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::from_millis(genesis.timestamp_millis() as u64),
        EraDuration::Calendar {
            length: 1,
            unit: CalendarUnit::Months,
        },
        days(10),
        days(1),
        VotingDuration::SummitLevel { level: 1 },
    )
    .unwrap();

    // January 31st + 1 month clamps to February 29th (2024 is a leap year)
    let expected = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
    assert_eq!(
        conf.era_end(conf.genesis_era_start_tick()),
        Tick::new(expected.timestamp_millis() as u64)
    );
}

#[test]
fn calendar_year_addition_clamps_leap_day() {
    let genesis = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
    let conf = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::from_millis(genesis.timestamp_millis() as u64),
        EraDuration::Calendar {
            length: 1,
            unit: CalendarUnit::Years,
        },
        days(10),
        days(1),
        VotingDuration::SummitLevel { level: 1 },
    )
    .unwrap();

    let expected = Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap();
    assert_eq!(
        conf.era_end(conf.genesis_era_start_tick()),
        Tick::new(expected.timestamp_millis() as u64)
    );
}

#[test]
fn calendar_eras_may_vary_in_length() {
    let genesis = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let conf = HighwayConf::new(
        TickUnit::MILLISECONDS,
        Timestamp::from_millis(genesis.timestamp_millis() as u64),
        EraDuration::Calendar {
            length: 1,
            unit: CalendarUnit::Months,
        },
        days(10),
        days(1),
        VotingDuration::SummitLevel { level: 1 },
    )
    .unwrap();

    let start = conf.genesis_era_start_tick();
    let january_end = conf.era_end(start);
    let february_end = conf.era_end(january_end);

    let january = january_end.checked_duration_since(start).unwrap();
    let february = february_end.checked_duration_since(january_end).unwrap();
    assert_eq!(january, days(31));
    assert_eq!(february, days(29));
}

#[test]
fn tick_conversions_delegate_to_the_unit() {
    let conf = HighwayConf::new(
        TickUnit::SECONDS,
        Timestamp::from_millis(1_500),
        EraDuration::FixedLength {
            ticks: TickDuration::new(604_800),
        },
        TickDuration::new(864_000),
        TickDuration::new(86_400),
        VotingDuration::SummitLevel { level: 1 },
    )
    .unwrap();

    assert_eq!(conf.to_ticks(Timestamp::from_millis(2_999)), Tick::new(2));
    assert_eq!(conf.to_timestamp(Tick::new(2)), Timestamp::from_millis(2_000));
    // Genesis start truncates to the tick unit's resolution
    assert_eq!(conf.genesis_era_start_tick(), Tick::new(1));
}
