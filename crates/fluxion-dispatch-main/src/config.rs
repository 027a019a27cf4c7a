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

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fluxion_dispatch_core::{LoopSettings, MAX_RECHECK_SECS, MIN_RECHECK_SECS};
use fluxion_dispatch_types::schedule::validate_time_zone;
use fluxion_dispatch_types::{
    ActionType, Device, DeviceId, DriverKind, ScheduleId, ScheduleItem, ScheduleType,
};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,

    #[serde(default = "default_devices")]
    pub devices: Vec<Device>,

    /// Schedules created (or refreshed by name) at startup
    #[serde(default)]
    pub schedules: Vec<ScheduleSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            dispatch: DispatchConfig::default(),
            store: StoreConfig::default(),
            home_assistant: HomeAssistantConfig::default(),
            devices: default_devices(),
            schedules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemConfig {
    /// Debug mode: every device is driven by the simulator
    #[serde(default = "default_true")]
    pub debug_mode: bool,

    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debug_mode: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Run the poll loop; management commands work either way
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: i64,

    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: i64,

    #[serde(default = "default_true")]
    pub check_status: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: MIN_RECHECK_SECS,
            max_interval_secs: MAX_RECHECK_SECS,
            check_status: true,
        }
    }
}

impl DispatchConfig {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            min_interval_secs: self.min_interval_secs,
            max_interval_secs: self.max_interval_secs,
            check_status: self.check_status,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Sqlite,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => anyhow::bail!("Unknown store kind: '{other}' (must be: memory or sqlite)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Database file, used by the sqlite store
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HomeAssistantConfig {
    /// Falls back to `HA_BASE_URL`, then `http://localhost:8123`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Falls back to `HA_TOKEN`
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSeed {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ScheduleType,

    /// Offset from UTC in seconds
    #[serde(default)]
    pub time_zone: i64,

    #[serde(default)]
    pub items: Vec<SlotSeed>,

    #[serde(default)]
    pub bindings: Vec<BindingSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotSeed {
    pub start_at: i64,

    #[serde(default)]
    pub end_at: Option<i64>,

    #[serde(default = "default_action_type")]
    pub action_type: ActionType,

    pub value: i64,
}

impl SlotSeed {
    pub fn to_item(&self, schedule_id: ScheduleId) -> ScheduleItem {
        ScheduleItem {
            schedule_id,
            start_at: self.start_at,
            end_at: self.end_at,
            action_type: self.action_type,
            value: self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindingSeed {
    pub device_id: DeviceId,

    #[serde(default)]
    pub order: i32,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_min_interval_secs() -> i64 {
    MIN_RECHECK_SECS
}

fn default_max_interval_secs() -> i64 {
    MAX_RECHECK_SECS
}

fn default_db_path() -> String {
    "data/dispatch.db".to_owned()
}

fn default_action_type() -> ActionType {
    ActionType::Charge
}

fn default_devices() -> Vec<Device> {
    vec![Device {
        id: 1,
        name: "battery".to_owned(),
        driver: DriverKind::Simulated,
        max_charge_w: 5000,
        max_discharge_w: 5000,
        setpoint_entity: None,
        mode_entity: None,
    }]
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit path wins; otherwise `config.toml`, then `config.json` in the
    /// working directory, then defaults with environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let config = Self::from_file(path)?;
            info!(path = %path.display(), "✅ Loaded configuration");
            config.validate()?;
            return Ok(config);
        }

        if let Ok(config_str) = std::fs::read_to_string("config.toml") {
            let config: AppConfig =
                toml::from_str(&config_str).context("Failed to parse config.toml")?;
            info!("✅ Loaded configuration from config.toml");
            config.validate()?;
            return Ok(config);
        }

        if let Ok(config_str) = std::fs::read_to_string("config.json") {
            let config: AppConfig =
                serde_json::from_str(&config_str).context("Failed to parse config.json")?;
            info!("✅ Loaded configuration from config.json");
            config.validate()?;
            return Ok(config);
        }

        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    /// Load from environment variables (development/testing)
    fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(kind) = std::env::var("DISPATCH_STORE")
            && let Ok(kind) = kind.parse::<StoreKind>()
        {
            config.store.kind = kind;
        }

        if let Ok(path) = std::env::var("DISPATCH_DB_PATH") {
            config.store.path = path;
        }

        if let Ok(debug_mode) = std::env::var("DEBUG_MODE")
            && let Ok(enabled) = debug_mode.parse::<bool>()
        {
            config.system.debug_mode = enabled;
        }

        if let Ok(url) = std::env::var("HA_BASE_URL") {
            config.home_assistant.base_url = Some(url);
        }

        if let Ok(token) = std::env::var("HA_TOKEN") {
            config.home_assistant.token = Some(token);
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        let dispatch = &self.dispatch;
        if dispatch.min_interval_secs < 1 {
            anyhow::bail!("min_interval_secs must be at least 1 second");
        }
        if dispatch.max_interval_secs < dispatch.min_interval_secs {
            anyhow::bail!(
                "max_interval_secs ({}) must not be below min_interval_secs ({})",
                dispatch.max_interval_secs,
                dispatch.min_interval_secs
            );
        }

        if self.store.kind == StoreKind::Sqlite && self.store.path.trim().is_empty() {
            anyhow::bail!("store.path cannot be empty for the sqlite store");
        }

        let mut ids = HashSet::new();
        for device in &self.devices {
            if !ids.insert(device.id) {
                anyhow::bail!("Duplicate device id {}", device.id);
            }
            if device.name.trim().is_empty() {
                anyhow::bail!("Device {} has empty name", device.id);
            }
            if device.max_charge_w < 0 || device.max_discharge_w < 0 {
                anyhow::bail!(
                    "Device '{}' has negative rate limits (use positive watts for both)",
                    device.name
                );
            }
            if device.driver == DriverKind::HomeAssistant && device.setpoint_entity.is_none() {
                anyhow::bail!(
                    "Device '{}' uses the home-assistant driver but has no setpoint_entity",
                    device.name
                );
            }
        }

        for seed in &self.schedules {
            if seed.name.trim().is_empty() {
                anyhow::bail!("Schedule seed has empty name");
            }
            validate_time_zone(seed.time_zone)
                .with_context(|| format!("Schedule '{}'", seed.name))?;
            for slot in &seed.items {
                slot.to_item(0)
                    .validate(seed.kind)
                    .with_context(|| format!("Schedule '{}'", seed.name))?;
            }
            for binding in &seed.bindings {
                if !ids.contains(&binding.device_id) {
                    anyhow::bail!(
                        "Schedule '{}' is bound to unknown device {}",
                        seed.name,
                        binding.device_id
                    );
                }
            }
        }

        Ok(())
    }
}
