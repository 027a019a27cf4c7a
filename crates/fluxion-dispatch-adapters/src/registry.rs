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

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use tracing::info;

use fluxion_dispatch_core::{DeviceDriver, DriverProvider};
use fluxion_dispatch_types::{Device, DeviceId, DriverKind};

use crate::ha::{HaDeviceDriver, HomeAssistantClient};
use crate::simulated::SimulatedDevice;

/// Builds one driver per device and hands out the same instance afterwards.
///
/// With `simulate_all` set every device gets a [`SimulatedDevice`], whatever
/// its configured driver.
pub struct DriverRegistry {
    ha_client: Option<HomeAssistantClient>,
    simulate_all: bool,
    drivers: Mutex<HashMap<DeviceId, Arc<dyn DeviceDriver>>>,
    simulated: Mutex<HashMap<DeviceId, Arc<SimulatedDevice>>>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("ha_client", &self.ha_client)
            .field("simulate_all", &self.simulate_all)
            .finish_non_exhaustive()
    }
}

impl DriverRegistry {
    pub fn new(ha_client: Option<HomeAssistantClient>, simulate_all: bool) -> Self {
        Self {
            ha_client,
            simulate_all,
            drivers: Mutex::new(HashMap::new()),
            simulated: Mutex::new(HashMap::new()),
        }
    }

    /// Simulated driver of a device, once built
    pub fn simulated(&self, device_id: DeviceId) -> Option<Arc<SimulatedDevice>> {
        self.simulated.lock().get(&device_id).cloned()
    }

    fn build(&self, device: &Device) -> Result<Arc<dyn DeviceDriver>> {
        let kind = if self.simulate_all {
            DriverKind::Simulated
        } else {
            device.driver
        };

        match kind {
            DriverKind::Simulated => {
                let sim = Arc::new(SimulatedDevice::new(device));
                self.simulated.lock().insert(device.id, Arc::clone(&sim));
                Ok(sim)
            }
            DriverKind::HomeAssistant => {
                let client = self.ha_client.clone().ok_or_else(|| {
                    anyhow!(
                        "device {} needs Home Assistant but no HA connection is configured",
                        device.id
                    )
                })?;
                Ok(Arc::new(HaDeviceDriver::new(client, device)?))
            }
        }
    }
}

impl DriverProvider for DriverRegistry {
    fn driver_for(&self, device: &Device) -> Result<Arc<dyn DeviceDriver>> {
        if let Some(driver) = self.drivers.lock().get(&device.id) {
            return Ok(Arc::clone(driver));
        }
        let driver = self.build(device)?;
        info!(device_id = device.id, driver = driver.name(), "Driver created");
        self.drivers.lock().insert(device.id, Arc::clone(&driver));
        Ok(driver)
    }
}
