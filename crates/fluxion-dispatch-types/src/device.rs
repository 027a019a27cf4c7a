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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

pub type DeviceId = i64;

/// How a device is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    /// In-process stand-in that only records commands
    Simulated,
    /// Set-point written through Home Assistant entities
    HomeAssistant,
}

impl DriverKind {
    pub fn to_config_value(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::HomeAssistant => "home-assistant",
        }
    }

    pub fn all() -> &'static [DriverKind] {
        &[Self::Simulated, Self::HomeAssistant]
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_config_value())
    }
}

impl FromStr for DriverKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "home-assistant" | "home_assistant" | "ha" => Ok(Self::HomeAssistant),
            _ => Err(ValidationError::UnknownDriver(s.to_owned())),
        }
    }
}

/// A battery inverter the engine can command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub driver: DriverKind,

    /// Upper charge limit in watts, reported to the reconciler by the driver
    pub max_charge_w: i64,
    /// Upper discharge limit in watts (positive number)
    pub max_discharge_w: i64,

    /// Entity receiving the absolute set-point (HA driver)
    #[serde(default)]
    pub setpoint_entity: Option<String>,
    /// Select entity toggling external control on and off (HA driver)
    #[serde(default)]
    pub mode_entity: Option<String>,
}

/// Reachability as reported by the driver before a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Ok,
    Unreachable,
    Fault(String),
}

impl DeviceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Unreachable => f.write_str("unreachable"),
            Self::Fault(reason) => write!(f, "fault: {reason}"),
        }
    }
}
