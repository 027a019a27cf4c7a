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

//! Activity of action windows, absolute or weekly-repeating.
//!
//! Weekly windows are compared on the 7-day axis anchored at the Unix epoch, so
//! `active_from` and `active_until` only matter modulo one week.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Seven days in milliseconds
pub const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Projection of a window onto a display range, as insets from each edge.
///
/// `start` is the fraction of the range before the window begins and `end` the
/// fraction after it ends, so a window covering the whole range is `{0, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayWindow {
    pub start: f64,
    pub end: f64,
}

fn week_offset(ms: i64) -> i64 {
    ms.rem_euclid(WEEK_MS)
}

/// Half-open overlap of `[from, until)` with `[start, end)`.
/// An empty display range overlaps when the window contains its instant.
fn overlaps(from: i64, until: i64, start: i64, end: i64) -> bool {
    if start == end {
        from <= start && start < until
    } else {
        from < end && start < until
    }
}

impl Action {
    /// Whether the window contains `now`.
    ///
    /// `created_at` is not consulted here so that the weekly predicate stays
    /// periodic; see [`Action::is_in_effect`].
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if let Some(deleted_at) = self.deleted_at
            && deleted_at <= now
        {
            return false;
        }

        if !self.repeat_weekly {
            return self.active_from <= now && now < self.active_until;
        }

        let r_now = week_offset(now.timestamp_millis());
        let r_from = week_offset(self.active_from.timestamp_millis());
        let r_until = week_offset(self.active_until.timestamp_millis());

        (r_from <= r_now && r_now < r_until)
            || (r_until < r_from && !(r_until <= r_now && r_now < r_from))
    }

    /// Active and already created. A split copy does nothing before it resumes.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now && self.is_active(now)
    }

    /// Locate this window inside `[range_start, range_end)` for timeline rendering.
    pub fn display_window(
        &self,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Option<DisplayWindow> {
        let start = range_start.timestamp_millis();
        let end = range_end.timestamp_millis();
        let created = self.created_at.timestamp_millis();
        let deleted = self.deleted_at.map(|d| d.timestamp_millis());

        if end < created || deleted.is_some_and(|d| d <= start) {
            return None;
        }

        let base_from = self.active_from.timestamp_millis();
        let base_until = self.active_until.timestamp_millis();

        let (from, until) = if self.repeat_weekly {
            let aligned = start.div_euclid(WEEK_MS) - base_from.div_euclid(WEEK_MS);
            // aligned week first, then the following one; the preceding week
            // only matters for occurrences that wrap into the range
            [aligned, aligned + 1, aligned - 1]
                .into_iter()
                .map(|weeks| (base_from + weeks * WEEK_MS, base_until + weeks * WEEK_MS))
                .find(|&(from, until)| overlaps(from, until, start, end))?
        } else {
            (base_from, base_until)
        };

        let from = from.max(created);
        let until = deleted.map_or(until, |d| d.min(until));
        if !overlaps(from, until, start, end) {
            return None;
        }

        let span = end - start;
        if span == 0 {
            return Some(DisplayWindow {
                start: 0.0,
                end: 0.0,
            });
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "millisecond spans stay far below f64 precision limits"
        )]
        let fraction = |ms: i64| (ms as f64 / span as f64).max(0.0);

        Some(DisplayWindow {
            start: fraction(from - start),
            end: fraction(end - until),
        })
    }

    /// Seconds until this action's activity could next change, if it ever does.
    ///
    /// Counts the next crossing of its own boundaries and of `created_at` and
    /// `deleted_at`, rounded up to whole seconds.
    pub fn time_till_change(&self, now: DateTime<Utc>) -> Option<i64> {
        let now_ms = now.timestamp_millis();
        if self.deleted_at.is_some_and(|d| d.timestamp_millis() <= now_ms) {
            return None;
        }

        let mut distances = Vec::with_capacity(4);
        if self.repeat_weekly {
            let r_now = week_offset(now_ms);
            for boundary in [self.active_from, self.active_until] {
                let r = week_offset(boundary.timestamp_millis());
                distances.push((r - r_now).rem_euclid(WEEK_MS));
            }
        } else {
            distances.push(self.active_from.timestamp_millis() - now_ms);
            distances.push(self.active_until.timestamp_millis() - now_ms);
        }
        distances.push(self.created_at.timestamp_millis() - now_ms);
        if let Some(deleted_at) = self.deleted_at {
            distances.push(deleted_at.timestamp_millis() - now_ms);
        }

        distances
            .into_iter()
            .filter(|&ms| ms > 0)
            .min()
            .map(|ms| (ms + 999).div_euclid(1000))
    }
}
