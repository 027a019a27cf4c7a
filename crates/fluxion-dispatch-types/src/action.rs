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

use crate::device::DeviceId;
use crate::validation::ValidationError;

pub type ActionId = i64;

// ============= Action Type Enum =============

/// Kinds of directive a window can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Battery set-point in watts, negative values discharge
    Charge,
}

impl ActionType {
    /// Wire tag used in storage and config
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "charge",
        }
    }

    /// List all action types, in evaluation order
    pub fn all() -> &'static [ActionType] {
        &[Self::Charge]
    }

    /// Command realizing `value` for this type
    pub fn command(self, value: i64) -> Command {
        match self {
            Self::Charge => Command::Charge { watts: value },
        }
    }

    /// Command handing the device back to its own control
    pub fn idle_command(self) -> Command {
        match self {
            Self::Charge => Command::Charge { watts: 0 },
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "charge" => Ok(Self::Charge),
            _ => Err(ValidationError::UnknownActionType(s.to_owned())),
        }
    }
}

/// A concrete instruction for a device driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Charge { watts: i64 },
}

impl Command {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Charge { .. } => ActionType::Charge,
        }
    }

    pub fn is_idle(&self) -> bool {
        match self {
            Self::Charge { watts } => *watts == 0,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Charge { watts } => write!(f, "charge {watts}W"),
        }
    }
}

// ============= Action Record =============

/// A one-off or weekly-repeating directive attached to a single device.
///
/// Records are never edited in place. Ending or splitting an action produces
/// new values (see [`Action::ended_at`] and [`Action::resumed_at`]) that the
/// store swaps in under the same or a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub device_id: DeviceId,
    pub action_type: ActionType,

    /// Signed set-point in device units (watts)
    pub value: i64,

    pub active_from: DateTime<Utc>,
    pub active_until: DateTime<Utc>,

    #[serde(default)]
    pub repeat_weekly: bool,

    pub created_at: DateTime<Utc>,

    /// Early termination boundary. Set when the user stops the action.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Copy of this record terminated at `when`.
    #[must_use]
    pub fn ended_at(&self, when: DateTime<Utc>) -> Self {
        Self {
            deleted_at: Some(when),
            ..self.clone()
        }
    }

    /// Copy of this record that only takes effect from `resume_at`, under a new id.
    ///
    /// The original termination boundary is kept, so a copy of an action that
    /// was already stopped later stays stopped at the same instant.
    #[must_use]
    pub fn resumed_at(&self, id: ActionId, resume_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: resume_at,
            ..self.clone()
        }
    }
}

/// Everything needed to create an [`Action`]; the store assigns id and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAction {
    pub device_id: DeviceId,
    pub action_type: ActionType,
    pub value: i64,
    pub active_from: DateTime<Utc>,
    pub active_until: DateTime<Utc>,
    #[serde(default)]
    pub repeat_weekly: bool,
}

impl NewAction {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.active_from >= self.active_until {
            return Err(ValidationError::EmptyWindow);
        }
        Ok(())
    }

    pub fn into_action(self, id: ActionId, created_at: DateTime<Utc>) -> Action {
        Action {
            id,
            device_id: self.device_id,
            action_type: self.action_type,
            value: self.value,
            active_from: self.active_from,
            active_until: self.active_until,
            repeat_weekly: self.repeat_weekly,
            created_at,
            deleted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Action {
        let from = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
        NewAction {
            device_id: 1,
            action_type: ActionType::Charge,
            value: 2000,
            active_from: from,
            active_until: from + Duration::hours(6),
            repeat_weekly: true,
        }
        .into_action(7, from - Duration::days(1))
    }

    #[test]
    fn test_action_type_parsing() {
        assert_eq!("charge".parse::<ActionType>().unwrap(), ActionType::Charge);
        assert_eq!(" Charge ".parse::<ActionType>().unwrap(), ActionType::Charge);
        assert!(matches!(
            "boost".parse::<ActionType>(),
            Err(ValidationError::UnknownActionType(_))
        ));
    }

    #[test]
    fn test_action_type_serializes_as_tag() {
        let json = serde_json::to_string(&ActionType::Charge).unwrap();
        assert_eq!(json, "\"charge\"");
    }

    #[test]
    fn test_command_idle() {
        assert!(ActionType::Charge.idle_command().is_idle());
        assert!(!ActionType::Charge.command(-500).is_idle());
        assert_eq!(ActionType::Charge.command(-500).to_string(), "charge -500W");
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let now = Utc::now();
        let info = NewAction {
            device_id: 1,
            action_type: ActionType::Charge,
            value: 100,
            active_from: now,
            active_until: now,
            repeat_weekly: false,
        };
        assert_eq!(info.validate(), Err(ValidationError::EmptyWindow));
    }

    #[test]
    fn test_ended_at_keeps_other_fields() {
        let action = sample();
        let end = action.active_from + Duration::hours(1);
        let ended = action.ended_at(end);

        assert_eq!(ended.deleted_at, Some(end));
        assert_eq!(ended.id, action.id);
        assert_eq!(ended.value, action.value);
        assert!(action.deleted_at.is_none());
    }

    #[test]
    fn test_resumed_at_keeps_termination() {
        let action = sample();
        let stop = action.active_from + Duration::weeks(4);
        let resume = action.active_from + Duration::weeks(1);
        let copy = action.ended_at(stop).resumed_at(8, resume);

        assert_eq!(copy.id, 8);
        assert_eq!(copy.created_at, resume);
        assert_eq!(copy.deleted_at, Some(stop));
    }
}
