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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::action::ActionType;
use crate::cycle::{self, CycleDescriptor};
use crate::validation::ValidationError;

pub type ScheduleId = i64;

/// Largest accepted local time offset, in seconds
pub const MAX_TIME_ZONE_OFFSET: i64 = 14 * 3600;

// ============= Schedule Type Enum =============

/// Cycle kinds a schedule can repeat on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleType {
    /// 24h cycle split into 15-minute slots
    Day,
    /// 7-day cycle, items act as continuous intervals
    Week,
}

impl ScheduleType {
    pub const fn descriptor(self) -> CycleDescriptor {
        match self {
            Self::Day => CycleDescriptor {
                range: 86_400,
                lookahead_before: 900,
                is_discreet: true,
            },
            Self::Week => CycleDescriptor {
                range: 604_800,
                lookahead_before: 900,
                is_discreet: false,
            },
        }
    }

    pub fn to_config_value(&self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Week => "WEEK",
        }
    }

    pub fn all() -> &'static [ScheduleType] {
        &[Self::Day, Self::Week]
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_config_value())
    }
}

impl FromStr for ScheduleType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DAY" => Ok(Self::Day),
            "WEEK" => Ok(Self::Week),
            _ => Err(ValidationError::UnknownScheduleType(s.to_owned())),
        }
    }
}

// ============= Records =============

/// One entry on a schedule's cycle.
///
/// `start_at`/`end_at` are second offsets inside the cycle. Without `end_at` the
/// item is a snap point that only acts inside the cycle's lookahead slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub schedule_id: ScheduleId,
    pub start_at: i64,
    #[serde(default)]
    pub end_at: Option<i64>,
    pub action_type: ActionType,
    pub value: i64,
}

impl ScheduleItem {
    /// Check the offsets against a cycle of `kind`.
    pub fn validate(&self, kind: ScheduleType) -> Result<(), ValidationError> {
        let range = kind.descriptor().range;
        for offset in std::iter::once(self.start_at).chain(self.end_at) {
            if !(0..range).contains(&offset) {
                return Err(ValidationError::OffsetOutOfCycle { offset, range });
            }
        }
        Ok(())
    }
}

/// A named, recurring plan of items on one cycle kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ScheduleType,

    /// Local offset from UTC in seconds, applied before locating the cycle position
    #[serde(default)]
    pub time_zone: i64,

    #[serde(default)]
    pub items: Vec<ScheduleItem>,
}

impl Schedule {
    pub fn position(&self, now: DateTime<Utc>) -> i64 {
        cycle::position_in_cycle(self.kind, now, self.time_zone)
    }

    /// Items of `action_type` that act at cycle position `position`
    pub fn effective_items(
        &self,
        action_type: ActionType,
        position: i64,
    ) -> impl Iterator<Item = &ScheduleItem> + '_ {
        let kind = self.kind;
        self.items.iter().filter(move |item| {
            item.action_type == action_type && cycle::item_is_effective(item, kind, position)
        })
    }
}

pub fn validate_time_zone(offset: i64) -> Result<(), ValidationError> {
    if offset.abs() > MAX_TIME_ZONE_OFFSET {
        return Err(ValidationError::TimeZoneOutOfRange(offset));
    }
    Ok(())
}

/// A schedule as bound to one device. Lower `order` wins ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundSchedule {
    pub order: i32,
    pub schedule: Schedule,
}
