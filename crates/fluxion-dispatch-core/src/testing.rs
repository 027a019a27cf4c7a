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

//! Fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use parking_lot::Mutex;

use fluxion_dispatch_types::{Device, DeviceId, DeviceStatus, DriverKind};

use crate::traits::{DeviceDriver, DriverProvider};

#[derive(Debug)]
pub struct RecordingDriver {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    fail_connect: AtomicBool,
    fail_charge: AtomicBool,
    panic_charge: AtomicBool,
    status: Mutex<DeviceStatus>,
    limits: Mutex<(i64, i64)>,
    delay: Mutex<Option<Duration>>,
    commands: Mutex<Vec<i64>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            fail_charge: AtomicBool::new(false),
            panic_charge: AtomicBool::new(false),
            status: Mutex::new(DeviceStatus::Ok),
            limits: Mutex::new((5000, 5000)),
            delay: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<i64> {
        self.commands.lock().clone()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_charge(&self, fail: bool) {
        self.fail_charge.store(fail, Ordering::SeqCst);
    }

    pub fn panic_charge(&self, panic: bool) {
        self.panic_charge.store(panic, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: DeviceStatus) {
        *self.status.lock() = status;
    }

    pub fn set_limits(&self, max_charge: i64, max_discharge: i64) {
        *self.limits.lock() = (max_charge, max_discharge);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl DeviceDriver for RecordingDriver {
    async fn connect(&self) -> Result<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self) -> Result<DeviceStatus> {
        Ok(self.status.lock().clone())
    }

    async fn max_charge_rate(&self) -> Result<i64> {
        Ok(self.limits.lock().0)
    }

    async fn max_discharge_rate(&self) -> Result<i64> {
        Ok(self.limits.lock().1)
    }

    async fn charge_battery(&self, value: i64) -> Result<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        assert!(!self.panic_charge.load(Ordering::SeqCst), "driver crashed");
        if self.fail_charge.load(Ordering::SeqCst) {
            bail!("write timed out");
        }
        self.commands.lock().push(value);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Hands out pre-registered drivers by device id
#[derive(Debug, Default)]
pub struct StaticProvider {
    drivers: Mutex<HashMap<DeviceId, Arc<RecordingDriver>>>,
}

impl StaticProvider {
    pub fn insert(&self, device_id: DeviceId) -> Arc<RecordingDriver> {
        let driver = Arc::new(RecordingDriver::new());
        self.drivers.lock().insert(device_id, driver.clone());
        driver
    }
}

impl DriverProvider for StaticProvider {
    fn driver_for(&self, device: &Device) -> Result<Arc<dyn DeviceDriver>> {
        let driver = self
            .drivers
            .lock()
            .get(&device.id)
            .cloned()
            .ok_or_else(|| anyhow!("no driver for device {}", device.id))?;
        Ok(driver)
    }
}

pub fn device(id: DeviceId) -> Device {
    Device {
        id,
        name: format!("inverter-{id}"),
        driver: DriverKind::Simulated,
        max_charge_w: 5000,
        max_discharge_w: 5000,
        setpoint_entity: None,
        mode_entity: None,
    }
}
