//! Money-flow calculator (§4.C): pure functions only, no wall-clock reads.
//!
//! Every function here is deterministic — same inputs always yield the same
//! outputs — which is what lets the race processor unit-test the formulas in
//! isolation from the scheduler and the upstream client.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::IntervalType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAmounts {
    pub win_cents: i64,
    pub place_cents: i64,
    pub total_cents: i64,
}

/// `poolAmounts(holdPct, poolTotals) -> {win_cents, place_cents, total_cents}`.
///
/// `win_total_dollars`/`place_total_dollars` are the raw upstream pool totals
/// (dollars, not yet converted to cents).
pub fn pool_amounts(
    hold_pct: Decimal,
    win_total_dollars: Decimal,
    place_total_dollars: Decimal,
) -> PoolAmounts {
    let win_cents = amount_cents(hold_pct, win_total_dollars);
    let place_cents = amount_cents(hold_pct, place_total_dollars);
    PoolAmounts {
        win_cents,
        place_cents,
        total_cents: win_cents + place_cents,
    }
}

fn amount_cents(hold_pct: Decimal, pool_total_dollars: Decimal) -> i64 {
    let cents = (hold_pct / Decimal::from(100)) * pool_total_dollars * Decimal::from(100);
    cents.round().to_i64().unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolPercentages {
    pub win_pct: Option<Decimal>,
    pub place_pct: Option<Decimal>,
}

/// `poolPercentages(amounts, poolTotals) -> {win_pct|null, place_pct|null}`.
/// Null when the corresponding pool total (in cents) is zero.
pub fn pool_percentages(amounts: PoolAmounts, win_total_cents: i64, place_total_cents: i64) -> PoolPercentages {
    let win_pct = if win_total_cents == 0 {
        None
    } else {
        Some(Decimal::from(amounts.win_cents) / Decimal::from(win_total_cents) * Decimal::from(100))
    };
    let place_pct = if place_total_cents == 0 {
        None
    } else {
        Some(Decimal::from(amounts.place_cents) / Decimal::from(place_total_cents) * Decimal::from(100))
    };
    PoolPercentages { win_pct, place_pct }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalDelta {
    pub inc_win: i64,
    pub inc_place: i64,
}

/// `incrementalDelta(current, previous|null) -> {incWin, incPlace}`.
/// When there is no previous snapshot the delta equals the current value
/// (the first poll acts as the baseline, per property 4 in §8).
pub fn incremental_delta(
    current_win_cents: i64,
    current_place_cents: i64,
    previous: Option<(i64, i64)>,
) -> IncrementalDelta {
    match previous {
        None => IncrementalDelta {
            inc_win: current_win_cents,
            inc_place: current_place_cents,
        },
        Some((prev_win, prev_place)) => IncrementalDelta {
            inc_win: current_win_cents - prev_win,
            inc_place: current_place_cents - prev_place,
        },
    }
}

/// `timelineInterval(minutesToStart) -> bucket` (§4.C.4).
///
/// Buckets round "toward the start" — for positive `tts` that means rounding
/// down (floor); for negative `tts` (post-start) that means rounding up
/// (ceiling, i.e. less negative).
pub fn timeline_interval(minutes_to_start: f64) -> f64 {
    if minutes_to_start > 60.0 {
        return 60.0;
    }
    if minutes_to_start > 30.0 {
        return round_toward_zero(minutes_to_start, 5.0);
    }
    if minutes_to_start > 5.0 {
        return round_toward_zero(minutes_to_start, 5.0);
    }
    if minutes_to_start > 1.0 {
        return round_toward_zero(minutes_to_start, 1.0);
    }
    if minutes_to_start >= 0.0 {
        return 0.0;
    }
    if minutes_to_start > -1.0 {
        return -0.5;
    }
    if minutes_to_start >= -2.5 {
        return round_toward_zero(minutes_to_start, 0.5);
    }
    if minutes_to_start >= -5.0 {
        return round_toward_zero(minutes_to_start, 1.0);
    }
    round_toward_zero(minutes_to_start, 1.0)
}

fn round_toward_zero(value: f64, step: f64) -> f64 {
    if value >= 0.0 {
        (value / step).floor() * step
    } else {
        (value / step).ceil() * step
    }
}

pub struct TimeMetadata {
    pub time_to_start: f64,
    pub time_interval: f64,
    pub interval_type: IntervalType,
}

/// `timeMetadata(raceStartInstant, nowInstant) -> {time_to_start, time_interval, interval_type}`.
pub fn time_metadata(race_start: DateTime<Utc>, now: DateTime<Utc>) -> TimeMetadata {
    let time_to_start = (race_start - now).num_seconds() as f64 / 60.0;
    let time_interval = timeline_interval(time_to_start);
    let abs_bucket = time_interval.abs();
    let interval_type = if abs_bucket > 30.0 {
        IntervalType::FiveMin
    } else if abs_bucket > 5.0 {
        IntervalType::TwoMin
    } else if abs_bucket > 1.0 {
        IntervalType::ThirtySec
    } else {
        IntervalType::Live
    };
    TimeMetadata {
        time_to_start,
        time_interval,
        interval_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn pool_amounts_matches_s1_scenario() {
        let amounts = pool_amounts(dec!(15.5), dec!(50000), dec!(30000));
        assert_eq!(amounts.win_cents, 775_000);
    }

    #[test]
    fn incremental_delta_first_poll_is_baseline() {
        let delta = incremental_delta(775_000, 0, None);
        assert_eq!(delta.inc_win, 775_000);
    }

    #[test]
    fn incremental_delta_is_signed_difference() {
        let delta = incremental_delta(800_000, 100_000, Some((775_000, 90_000)));
        assert_eq!(delta.inc_win, 25_000);
        assert_eq!(delta.inc_place, 10_000);
    }

    #[test]
    fn timeline_interval_matches_spec_examples() {
        assert_eq!(timeline_interval(61.0), 60.0);
        assert_eq!(timeline_interval(57.0), 55.0);
        assert_eq!(timeline_interval(3.5), 3.0);
        assert_eq!(timeline_interval(0.5), 0.0);
        assert_eq!(timeline_interval(-0.5), -0.5);
        assert_eq!(timeline_interval(-7.2), -7.0);
    }

    #[test]
    fn timeline_interval_is_non_decreasing_for_non_negative_tts() {
        let samples: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();
        let mut prev = f64::MIN;
        for tts in samples {
            let bucket = timeline_interval(tts);
            assert!(bucket >= prev);
            prev = bucket;
        }
    }

    #[test]
    fn pool_percentages_null_when_total_zero() {
        let amounts = PoolAmounts {
            win_cents: 0,
            place_cents: 500,
            total_cents: 500,
        };
        let pct = pool_percentages(amounts, 0, 10_000);
        assert_eq!(pct.win_pct, None);
        assert!(pct.place_pct.is_some());
    }

    #[test]
    fn time_metadata_reports_signed_minutes() {
        let now = "2025-10-14T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let start = now + Duration::minutes(10);
        let meta = time_metadata(start, now);
        assert!((meta.time_to_start - 10.0).abs() < 1e-9);
        // bucket = timeline_interval(10.0) = 10.0, which is > 5 -> TwoMin.
        assert_eq!(meta.time_interval, 10.0);
        assert_eq!(meta.interval_type, IntervalType::TwoMin);
    }

    /// interval_type must be derived from the rounded bucket, not the raw
    /// time-to-start: tts=31 buckets to 30 (floor-to-5), which falls in the
    /// (5, 30] range mapped to 2m, not the (30, 60] range mapped to 5m.
    #[test]
    fn time_metadata_interval_type_follows_the_bucket_not_the_raw_tts() {
        let now = "2025-10-14T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let start = now + Duration::minutes(31);
        let meta = time_metadata(start, now);
        assert_eq!(meta.time_interval, 30.0);
        assert_eq!(meta.interval_type, IntervalType::TwoMin);
    }

    #[test]
    fn time_metadata_interval_type_is_thirty_sec_at_the_five_minute_bucket_boundary() {
        let now = "2025-10-14T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let start = now + Duration::minutes(7);
        let meta = time_metadata(start, now);
        // bucket = timeline_interval(7.0) = 5.0, which is the boundary value
        // itself and therefore falls in the (1, 5] range mapped to 30s.
        assert_eq!(meta.time_interval, 5.0);
        assert_eq!(meta.interval_type, IntervalType::ThirtySec);
    }
}
