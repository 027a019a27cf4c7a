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

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use fluxion_dispatch_core::DeviceDriver;
use fluxion_dispatch_types::{Device, DeviceStatus};

/// Stand-in inverter for debug mode. Accepts every command and remembers it.
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    max_charge_w: i64,
    max_discharge_w: i64,
    connected: AtomicBool,
    setpoints: Mutex<Vec<i64>>,
}

impl SimulatedDevice {
    pub fn new(device: &Device) -> Self {
        Self {
            name: format!("simulated:{}", device.name),
            max_charge_w: device.max_charge_w,
            max_discharge_w: device.max_discharge_w,
            connected: AtomicBool::new(false),
            setpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Every set-point written so far, oldest first
    pub fn setpoints(&self) -> Vec<i64> {
        self.setpoints.lock().clone()
    }

    pub fn last_setpoint(&self) -> Option<i64> {
        self.setpoints.lock().last().copied()
    }
}

#[async_trait]
impl DeviceDriver for SimulatedDevice {
    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            bail!("{} is already connected", self.name);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self) -> Result<DeviceStatus> {
        Ok(DeviceStatus::Ok)
    }

    async fn max_charge_rate(&self) -> Result<i64> {
        Ok(self.max_charge_w)
    }

    async fn max_discharge_rate(&self) -> Result<i64> {
        Ok(self.max_discharge_w)
    }

    async fn charge_battery(&self, value: i64) -> Result<()> {
        if !self.is_connected() {
            bail!("{} is not connected", self.name);
        }
        info!(driver = %self.name, value, "Simulated set-point");
        self.setpoints.lock().push(value);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_dispatch_types::DriverKind;

    fn device() -> Device {
        Device {
            id: 3,
            name: "bench".to_owned(),
            driver: DriverKind::Simulated,
            max_charge_w: 3000,
            max_discharge_w: 2500,
            setpoint_entity: None,
            mode_entity: None,
        }
    }

    #[tokio::test]
    async fn test_records_setpoints_while_connected() {
        let sim = SimulatedDevice::new(&device());
        assert!(sim.charge_battery(100).await.is_err());

        sim.connect().await.unwrap();
        sim.charge_battery(100).await.unwrap();
        sim.charge_battery(-200).await.unwrap();
        sim.disconnect().await.unwrap();

        assert_eq!(sim.setpoints(), vec![100, -200]);
        assert_eq!(sim.last_setpoint(), Some(-200));
        assert!(!sim.is_connected());
    }

    #[tokio::test]
    async fn test_rejects_second_connection() {
        let sim = SimulatedDevice::new(&device());
        sim.connect().await.unwrap();
        assert!(sim.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_reports_configured_limits() {
        let sim = SimulatedDevice::new(&device());
        assert_eq!(sim.max_charge_rate().await.unwrap(), 3000);
        assert_eq!(sim.max_discharge_rate().await.unwrap(), 2500);
        assert_eq!(sim.name(), "simulated:bench");
    }
}
