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

use anyhow::Result;
use tracing::info;

use fluxion_dispatch_core::DispatchStore;

use crate::config::AppConfig;

/// Write configured devices and schedule seeds into `store`.
///
/// Schedules are matched by name, so running it again refreshes the same records.
pub async fn apply(store: &dyn DispatchStore, config: &AppConfig) -> Result<()> {
    for device in &config.devices {
        store.upsert_device(device.clone()).await?;
    }

    let existing = store.list_schedules().await?;
    for seed in &config.schedules {
        let schedule = match existing.iter().find(|s| s.name == seed.name) {
            Some(found) => {
                store.set_time_zone(found.id, seed.time_zone).await?;
                found.clone()
            }
            None => {
                store
                    .create_schedule(&seed.name, seed.kind, seed.time_zone)
                    .await?
            }
        };

        for slot in &seed.items {
            store.set_time_slot(slot.to_item(schedule.id)).await?;
        }
        for binding in &seed.bindings {
            store
                .bind_schedule(binding.device_id, schedule.id, binding.order)
                .await?;
        }

        info!(
            schedule = %seed.name,
            schedule_id = schedule.id,
            items = seed.items.len(),
            bindings = seed.bindings.len(),
            "Schedule seeded"
        );
    }

    info!(devices = config.devices.len(), "Devices registered");
    Ok(())
}
