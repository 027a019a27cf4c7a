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

//! Wiring and one-shot operations behind the `fluxion-dispatch` binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use fluxion_dispatch_adapters::{DriverRegistry, HomeAssistantClient};
use fluxion_dispatch_core::{
    DispatchError, DispatchRepository, DispatchStore, InMemoryStore, Limits, Plan, Reconciler,
};
use fluxion_dispatch_types::{Action, DeviceId, DisplayWindow, DriverKind};

use crate::config::{AppConfig, StoreKind};
use crate::db::SqliteStore;

pub fn open_store(config: &AppConfig) -> Result<Arc<dyn DispatchStore>> {
    match config.store.kind {
        StoreKind::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreKind::Sqlite => {
            let store = SqliteStore::open(&config.store.path)?;
            info!(path = %config.store.path, "Database opened");
            Ok(Arc::new(store))
        }
    }
}

/// Driver registry for the configured devices.
///
/// A Home Assistant client is only built when a device needs one outside debug mode.
pub fn build_drivers(config: &AppConfig) -> Result<DriverRegistry> {
    let needs_ha = !config.system.debug_mode
        && config
            .devices
            .iter()
            .any(|d| d.driver == DriverKind::HomeAssistant);

    let ha_client = if needs_ha {
        let client = HomeAssistantClient::from_config(
            config.home_assistant.base_url.clone(),
            config.home_assistant.token.clone(),
        )
        .context("Failed to create Home Assistant client")?;
        Some(client)
    } else {
        None
    };

    if config.system.debug_mode {
        info!("🔧 Debug mode: all devices use the simulated driver");
    }
    Ok(DriverRegistry::new(ha_client, config.system.debug_mode))
}

/// Reconcile a device at `at` against its configured limits, without any device I/O
pub async fn check(
    store: &dyn DispatchStore,
    config: &AppConfig,
    device_id: DeviceId,
    at: DateTime<Utc>,
) -> Result<Plan> {
    let device = store
        .list_devices()
        .await?
        .into_iter()
        .find(|d| d.id == device_id)
        .ok_or(DispatchError::DeviceNotFound(device_id))?;

    let schedules = store.list_bound_schedules(device_id).await?;
    let actions = store.list_actions_for_device(device_id).await?;
    let limits = Limits {
        max_charge: device.max_charge_w,
        max_discharge: device.max_discharge_w,
    };

    let reconciler = Reconciler::new(
        config.dispatch.min_interval_secs,
        config.dispatch.max_interval_secs,
    );
    Ok(reconciler.reconcile(device_id, &schedules, &actions, limits, at)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub action: Action,
    pub window: DisplayWindow,
}

/// Actions of a device placed on `[start, end)`, in id order
pub async fn timeline(
    store: &dyn DispatchStore,
    device_id: DeviceId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<TimelineEntry>> {
    if end < start {
        anyhow::bail!("Timeline end {end} is before its start {start}");
    }

    let mut actions = store.list_actions_in_range(device_id, start, end).await?;
    actions.sort_by_key(|a| a.id);

    Ok(actions
        .into_iter()
        .filter_map(|action| {
            action
                .display_window(start, end)
                .map(|window| TimelineEntry { action, window })
        })
        .collect())
}
