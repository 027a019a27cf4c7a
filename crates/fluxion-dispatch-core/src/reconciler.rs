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

//! Reconciliation of overlapping windows into one command per action type.
//!
//! Precedence, strongest first:
//! 1. one-off actions
//! 2. schedule items, lower binding order first; inside one schedule the item
//!    that started most recently on the cycle
//! 3. weekly-repeating actions
//!
//! Two candidates on the same level that cannot be told apart make the device
//! fail with [`DispatchError::UnresolvedOverlap`] for this pass, even when a
//! stronger level would win anyway. The outcome never depends on the order
//! candidates were collected in.

use chrono::{DateTime, Utc};
use serde::Serialize;

use fluxion_dispatch_types::{
    Action, ActionId, ActionType, BoundSchedule, Command, DeviceId, ScheduleId, cycle,
};

use crate::error::{DispatchError, Result};

/// Shortest wait between two passes over one device, in seconds
pub const MIN_RECHECK_SECS: i64 = 60;
/// Longest wait between two passes over one device, in seconds
pub const MAX_RECHECK_SECS: i64 = 900;

/// Where a candidate value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    OneOff {
        action_id: ActionId,
    },
    Weekly {
        action_id: ActionId,
    },
    Schedule {
        schedule_id: ScheduleId,
        order: i32,
        start_at: i64,
        /// Seconds since the item started on its cycle
        elapsed: i64,
    },
}

impl Source {
    /// Precedence level; higher wins outright
    fn level(&self) -> (u8, i64) {
        match self {
            Self::OneOff { .. } => (2, 0),
            Self::Schedule { order, .. } => (1, -i64::from(*order)),
            Self::Weekly { .. } => (0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub action_type: ActionType,
    pub value: i64,
    pub source: Source,
}

/// Device-reported set-point limits in watts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub max_charge: i64,
    /// Positive number
    pub max_discharge: i64,
}

impl Limits {
    pub fn clamp(&self, value: i64) -> i64 {
        value.min(self.max_charge).max(-self.max_discharge)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action_type: ActionType,
    pub source: Source,
    /// Winning value before clamping
    pub requested: i64,
    pub value: i64,
}

impl Decision {
    pub fn command(&self) -> Command {
        self.action_type.command(self.value)
    }
}

/// Outcome of reconciling one device at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub device_id: DeviceId,
    pub at: DateTime<Utc>,
    pub decisions: Vec<Decision>,
    pub next_recheck_secs: i64,
}

impl Plan {
    pub fn decision_for(&self, action_type: ActionType) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.action_type == action_type)
    }
}

/// Gather every window of `action_type` that acts at `now`.
///
/// Actions come first, then schedules from the highest binding order down.
pub fn collect_candidates(
    schedules: &[BoundSchedule],
    actions: &[Action],
    action_type: ActionType,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let from_actions = actions
        .iter()
        .filter(|a| a.action_type == action_type && a.is_in_effect(now))
        .map(|a| Candidate {
            action_type,
            value: a.value,
            source: if a.repeat_weekly {
                Source::Weekly { action_id: a.id }
            } else {
                Source::OneOff { action_id: a.id }
            },
        });

    let from_schedules = schedules.iter().rev().flat_map(|bound| {
        let schedule = &bound.schedule;
        let range = schedule.kind.descriptor().range;
        let position = schedule.position(now);
        schedule
            .effective_items(action_type, position)
            .map(move |item| Candidate {
                action_type,
                value: item.value,
                source: Source::Schedule {
                    schedule_id: schedule.id,
                    order: bound.order,
                    start_at: item.start_at,
                    elapsed: cycle::elapsed_since_start(item, position, range),
                },
            })
    });

    from_actions.chain(from_schedules).collect()
}

/// Reduce candidates to a single winner, or `None` when nothing is active.
pub fn resolve(
    device_id: DeviceId,
    action_type: ActionType,
    candidates: &[Candidate],
) -> Result<Option<Candidate>> {
    let overlap = |detail: String| DispatchError::UnresolvedOverlap {
        device_id,
        action_type,
        detail,
    };

    if let Some(detail) = find_tie(candidates) {
        return Err(overlap(detail));
    }

    let Some(top_level) = candidates.iter().map(|c| c.source.level()).max() else {
        return Ok(None);
    };
    let top: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.source.level() == top_level)
        .collect();

    match top.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(**single)),
        [first, ..] => most_recent_item(&top).map(Some).ok_or_else(|| {
            overlap(format!(
                "{:?} candidates cannot be ordered",
                first.source
            ))
        }),
    }
}

/// Every level must be strictly ordered, including the ones that lose.
fn find_tie(candidates: &[Candidate]) -> Option<String> {
    let (mut one_offs, mut weeklies) = (0_usize, 0_usize);
    let mut scheduled = Vec::new();
    for candidate in candidates {
        match candidate.source {
            Source::OneOff { .. } => one_offs += 1,
            Source::Weekly { .. } => weeklies += 1,
            Source::Schedule {
                schedule_id,
                order,
                elapsed,
                ..
            } => scheduled.push((schedule_id, order, elapsed)),
        }
    }

    if one_offs > 1 {
        return Some(format!("{one_offs} one-off actions active at once"));
    }
    if weeklies > 1 {
        return Some(format!("{weeklies} weekly actions active at once"));
    }

    scheduled
        .iter()
        .enumerate()
        .find_map(|(i, &(id, order, elapsed))| {
            scheduled[i + 1..]
                .iter()
                .find_map(|&(other, other_order, other_elapsed)| {
                    if id != other && order == other_order {
                        Some(format!(
                            "schedules {id} and {other} share binding order {order}"
                        ))
                    } else if id == other && elapsed == other_elapsed {
                        Some(format!("schedule {id} has items starting at the same offset"))
                    } else {
                        None
                    }
                })
        })
}

fn most_recent_item(items: &[&Candidate]) -> Option<Candidate> {
    let elapsed = |c: &Candidate| match c.source {
        Source::Schedule { elapsed, .. } => elapsed,
        Source::OneOff { .. } | Source::Weekly { .. } => i64::MAX,
    };
    let freshest = items.iter().map(|c| elapsed(*c)).min()?;
    let mut newest = items.iter().filter(|c| elapsed(**c) == freshest);
    let winner = newest.next()?;
    newest.next().is_none().then_some(**winner)
}

/// Stateless reconciliation with configurable re-check bounds.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    min_recheck_secs: i64,
    max_recheck_secs: i64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            min_recheck_secs: MIN_RECHECK_SECS,
            max_recheck_secs: MAX_RECHECK_SECS,
        }
    }
}

impl Reconciler {
    pub fn new(min_recheck_secs: i64, max_recheck_secs: i64) -> Self {
        Self {
            min_recheck_secs,
            max_recheck_secs: max_recheck_secs.max(min_recheck_secs),
        }
    }

    pub fn min_recheck_secs(&self) -> i64 {
        self.min_recheck_secs
    }

    pub fn max_recheck_secs(&self) -> i64 {
        self.max_recheck_secs
    }

    pub fn reconcile(
        &self,
        device_id: DeviceId,
        schedules: &[BoundSchedule],
        actions: &[Action],
        limits: Limits,
        now: DateTime<Utc>,
    ) -> Result<Plan> {
        let mut decisions = Vec::new();
        for &action_type in ActionType::all() {
            let candidates = collect_candidates(schedules, actions, action_type, now);
            if let Some(winner) = resolve(device_id, action_type, &candidates)? {
                decisions.push(Decision {
                    action_type,
                    source: winner.source,
                    requested: winner.value,
                    value: limits.clamp(winner.value),
                });
            }
        }

        Ok(Plan {
            device_id,
            at: now,
            decisions,
            next_recheck_secs: self.next_recheck(schedules, actions, now),
        })
    }

    /// Seconds until any window of the device could change state, bounded.
    pub fn next_recheck(
        &self,
        schedules: &[BoundSchedule],
        actions: &[Action],
        now: DateTime<Utc>,
    ) -> i64 {
        let mut next = self.max_recheck_secs;

        for bound in schedules {
            let schedule = &bound.schedule;
            let range = schedule.kind.descriptor().range;
            let position = schedule.position(now);

            if let Some(slot) = cycle::time_till_slot_boundary(schedule.kind, position) {
                next = next.min(slot);
            }
            // zero floors to the minimum so a snap item gets past its start
            if let Some(soonest) = schedule
                .items
                .iter()
                .map(|item| cycle::time_till_boundary(item, position, range))
                .min()
            {
                next = next.min(soonest);
            }
        }

        if let Some(soonest) = actions.iter().filter_map(|a| a.time_till_change(now)).min() {
            next = next.min(soonest);
        }

        next.clamp(self.min_recheck_secs, self.max_recheck_secs)
    }
}
