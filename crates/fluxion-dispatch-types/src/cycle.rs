// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Wraparound arithmetic on a schedule's repeating time axis.
//!
//! All values are whole seconds. A position is an offset in `[0, range)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{ScheduleItem, ScheduleType};

/// Constants describing one cycle kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDescriptor {
    /// Cycle length in seconds
    pub range: i64,
    /// Width of the window an item without `end_at` acts in
    pub lookahead_before: i64,
    /// True: snap items act in an aligned slot. False: in the trailing lookahead.
    pub is_discreet: bool,
}

/// Cycle position of `now`, shifted by the schedule's local offset.
pub fn position_in_cycle(kind: ScheduleType, now: DateTime<Utc>, time_zone: i64) -> i64 {
    let range = kind.descriptor().range;
    let seconds = (now.timestamp_millis() + 500).div_euclid(1000);
    (seconds + time_zone).rem_euclid(range)
}

/// `[lower, position]` range in which a snap item's `start_at` must fall to act.
pub fn effective_item_range(kind: ScheduleType, position: i64) -> (i64, i64) {
    let desc = kind.descriptor();
    let lower = if desc.is_discreet {
        position.div_euclid(desc.lookahead_before) * desc.lookahead_before
    } else {
        (position - desc.lookahead_before).rem_euclid(desc.range)
    };
    (lower, position)
}

/// Half-open membership that wraps when `end < start`.
pub fn value_between(x: i64, start: i64, end: i64) -> bool {
    if start <= end {
        start <= x && x < end
    } else {
        x < end || start <= x
    }
}

pub fn item_is_effective(item: &ScheduleItem, kind: ScheduleType, position: i64) -> bool {
    match item.end_at {
        None => {
            let (lower, upper) = effective_item_range(kind, position);
            value_between(item.start_at, lower, upper)
        }
        Some(end_at) => value_between(position, item.start_at, end_at),
    }
}

/// Forward distance from `from` to the item's nearest boundary, in `[0, range)`.
pub fn time_till_boundary(item: &ScheduleItem, from: i64, range: i64) -> i64 {
    let to_start = (item.start_at - from).rem_euclid(range);
    let to_end = item
        .end_at
        .map_or(range, |end_at| (end_at - from).rem_euclid(range));
    to_start.min(to_end)
}

/// Seconds until the next aligned slot starts, for discreet cycles only.
pub fn time_till_slot_boundary(kind: ScheduleType, position: i64) -> Option<i64> {
    let desc = kind.descriptor();
    desc.is_discreet
        .then(|| desc.lookahead_before - position.rem_euclid(desc.lookahead_before))
}

/// Age of an effective item, measured from its start. Smaller is more recent.
pub fn elapsed_since_start(item: &ScheduleItem, position: i64, range: i64) -> i64 {
    (position - item.start_at).rem_euclid(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use chrono::{Duration, TimeZone};

    const DAY: i64 = 86_400;

    fn item(start_at: i64, end_at: Option<i64>) -> ScheduleItem {
        ScheduleItem {
            schedule_id: 1,
            start_at,
            end_at,
            action_type: ActionType::Charge,
            value: 1500,
        }
    }

    #[test]
    fn test_position_wraps_daily() {
        let midnight = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        assert_eq!(position_in_cycle(ScheduleType::Day, midnight, 0), 0);
        assert_eq!(
            position_in_cycle(ScheduleType::Day, midnight + Duration::hours(1), 0),
            3600
        );
        assert_eq!(
            position_in_cycle(ScheduleType::Day, midnight + Duration::days(3), 0),
            0
        );
    }

    #[test]
    fn test_position_rounds_to_nearest_second() {
        let midnight = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let almost = midnight + Duration::milliseconds(1499);
        let half = midnight + Duration::milliseconds(1500);
        assert_eq!(position_in_cycle(ScheduleType::Day, almost, 0), 1);
        assert_eq!(position_in_cycle(ScheduleType::Day, half, 0), 2);
    }

    #[test]
    fn test_position_applies_time_zone() {
        let utc_2300 = Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap();
        // 23:00 UTC is 01:00 the next day at +02:00
        assert_eq!(position_in_cycle(ScheduleType::Day, utc_2300, 7200), 3600);
        assert_eq!(position_in_cycle(ScheduleType::Day, utc_2300, -3600), 22 * 3600);
    }

    #[test]
    fn test_effective_range_discreet_aligns_to_slot() {
        assert_eq!(effective_item_range(ScheduleType::Day, 1000), (900, 1000));
        assert_eq!(effective_item_range(ScheduleType::Day, 900), (900, 900));
        assert_eq!(effective_item_range(ScheduleType::Day, 899), (0, 899));
    }

    #[test]
    fn test_effective_range_continuous_wraps() {
        assert_eq!(effective_item_range(ScheduleType::Week, 5000), (4100, 5000));
        assert_eq!(effective_item_range(ScheduleType::Week, 100), (604_000, 100));
    }

    #[test]
    fn test_value_between() {
        assert!(value_between(5, 0, 10));
        assert!(!value_between(10, 0, 10));
        assert!(value_between(0, 0, 10));
        // wraparound
        assert!(value_between(23, 20, 4));
        assert!(value_between(2, 20, 4));
        assert!(!value_between(10, 20, 4));
        assert!(!value_between(4, 20, 4));
    }

    #[test]
    fn test_zero_length_window_never_matches() {
        for a in [0, 1, 450, DAY - 1] {
            assert!(!value_between(a, a, a));
        }
    }

    #[test]
    fn test_interval_item_effective_inside_bounds() {
        let slot = item(3600, Some(7200));
        assert!(!item_is_effective(&slot, ScheduleType::Day, 3599));
        assert!(item_is_effective(&slot, ScheduleType::Day, 3600));
        assert!(item_is_effective(&slot, ScheduleType::Day, 7199));
        assert!(!item_is_effective(&slot, ScheduleType::Day, 7200));
        assert!(!item_is_effective(&slot, ScheduleType::Day, 7300));
    }

    #[test]
    fn test_wrapping_interval_item() {
        let night = item(22 * 3600, Some(6 * 3600));
        assert!(item_is_effective(&night, ScheduleType::Day, 23 * 3600));
        assert!(item_is_effective(&night, ScheduleType::Day, 3600));
        assert!(!item_is_effective(&night, ScheduleType::Day, 12 * 3600));
    }

    #[test]
    fn test_snap_item_acts_within_its_slot() {
        let snap = item(900, None);
        assert!(!item_is_effective(&snap, ScheduleType::Day, 899));
        assert!(!item_is_effective(&snap, ScheduleType::Day, 900));
        assert!(item_is_effective(&snap, ScheduleType::Day, 901));
        assert!(item_is_effective(&snap, ScheduleType::Day, 1799));
        assert!(!item_is_effective(&snap, ScheduleType::Day, 1800));
    }

    #[test]
    fn test_snap_item_on_continuous_cycle_uses_trailing_lookahead() {
        let snap = item(10_000, None);
        assert!(item_is_effective(&snap, ScheduleType::Week, 10_001));
        assert!(item_is_effective(&snap, ScheduleType::Week, 10_900));
        assert!(!item_is_effective(&snap, ScheduleType::Week, 10_901));
    }

    #[test]
    fn test_time_till_boundary() {
        let slot = item(3600, Some(7200));
        assert_eq!(time_till_boundary(&slot, 3000, DAY), 600);
        assert_eq!(time_till_boundary(&slot, 5000, DAY), 2200);
        assert_eq!(time_till_boundary(&slot, 8000, DAY), DAY - 8000 + 3600);

        let snap = item(3600, None);
        assert_eq!(time_till_boundary(&snap, 3700, DAY), DAY - 100);
    }

    #[test]
    fn test_time_till_boundary_stays_in_range() {
        let items = [item(0, None), item(86_399, Some(0)), item(43_200, Some(100))];
        for it in &items {
            for from in (0..DAY).step_by(997) {
                let t = time_till_boundary(it, from, DAY);
                assert!((0..DAY).contains(&t), "{t} out of range for from={from}");
            }
        }
    }

    #[test]
    fn test_slot_boundary() {
        assert_eq!(time_till_slot_boundary(ScheduleType::Day, 1000), Some(800));
        assert_eq!(time_till_slot_boundary(ScheduleType::Day, 1800), Some(900));
        assert_eq!(time_till_slot_boundary(ScheduleType::Week, 1000), None);
    }
}
