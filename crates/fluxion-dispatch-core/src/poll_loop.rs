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

//! Self-scheduling driver of the reconciler.
//!
//! A pass visits every device concurrently. Each device is reconciled inside its
//! own session and failures stay with that device. After the pass the loop
//! sleeps until the earliest device is due again, never less than the minimum
//! and never more than the maximum interval.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use fluxion_dispatch_types::{ActionType, Command, Device, DeviceId};

use crate::error::{DispatchError, Result};
use crate::reconciler::{Limits, MAX_RECHECK_SECS, MIN_RECHECK_SECS, Plan, Reconciler};
use crate::session::DeviceSession;
use crate::traits::{DeviceDriver, DispatchRepository, DriverProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub min_interval_secs: i64,
    pub max_interval_secs: i64,
    /// Skip devices whose driver does not report an OK status
    pub check_status: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            min_interval_secs: MIN_RECHECK_SECS,
            max_interval_secs: MAX_RECHECK_SECS,
            check_status: true,
        }
    }
}

#[derive(Debug)]
pub enum DeviceOutcome {
    /// Deadline from an earlier pass has not elapsed yet
    NotDue,
    Applied { plan: Plan, commands: Vec<Command> },
    Failed(DispatchError),
}

#[derive(Debug)]
pub struct DeviceReport {
    pub device_id: DeviceId,
    pub next_eligible: DateTime<Utc>,
    pub outcome: DeviceOutcome,
}

#[derive(Debug)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub devices: Vec<DeviceReport>,
    pub next_wake: DateTime<Utc>,
}

struct Inner {
    repository: Arc<dyn DispatchRepository>,
    drivers: Arc<dyn DriverProvider>,
    reconciler: Reconciler,
    check_status: bool,
    running: AtomicBool,
    next_eligible: Mutex<HashMap<DeviceId, DateTime<Utc>>>,
    sessions: Mutex<HashMap<DeviceId, Arc<DeviceSession>>>,
    last_commands: Mutex<HashMap<(DeviceId, ActionType), Command>>,
}

/// Clears the running flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct PollLoop {
    inner: Arc<Inner>,
}

impl fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollLoop")
            .field("reconciler", &self.inner.reconciler)
            .field("running", &self.inner.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PollLoop {
    pub fn new(
        repository: Arc<dyn DispatchRepository>,
        drivers: Arc<dyn DriverProvider>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                repository,
                drivers,
                reconciler: Reconciler::new(settings.min_interval_secs, settings.max_interval_secs),
                check_status: settings.check_status,
                running: AtomicBool::new(false),
                next_eligible: Mutex::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
                last_commands: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn next_eligible(&self, device_id: DeviceId) -> Option<DateTime<Utc>> {
        self.inner.next_eligible.lock().get(&device_id).copied()
    }

    /// Run one pass over all devices.
    ///
    /// Returns `None` without doing anything when another pass is in progress.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Option<PassReport> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous dispatch pass still in progress, skipping");
            return None;
        }
        let _guard = PassGuard(&self.inner.running);

        let devices = match self.inner.repository.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                error!(error = %e, "Failed to list devices");
                let next_wake = now + Duration::seconds(self.inner.reconciler.min_recheck_secs());
                return Some(PassReport {
                    started_at: now,
                    devices: Vec::new(),
                    next_wake,
                });
            }
        };

        debug!(devices = devices.len(), "Starting dispatch pass");
        let mut tasks = JoinSet::new();
        let mut task_devices = HashMap::new();
        for device in devices {
            let device_id = device.id;
            let inner = Arc::clone(&self.inner);
            let handle = tasks.spawn(async move { inner.process_device(device, now).await });
            task_devices.insert(handle.id(), device_id);
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => {
                    let device_id = task_devices.get(&e.id()).copied();
                    error!(?device_id, error = %e, "Device task aborted");
                    // the dead task never released its hold on the session
                    if let Some(device_id) = device_id {
                        self.inner.sessions.lock().remove(&device_id);
                    }
                }
            }
        }
        reports.sort_by_key(|r| r.device_id);

        let next_wake = self.next_wake(now, &reports);
        info!(
            devices = reports.len(),
            next_wake = %next_wake,
            "Dispatch pass finished"
        );
        Some(PassReport {
            started_at: now,
            devices: reports,
            next_wake,
        })
    }

    /// Earliest device deadline, held inside `[now + min, now + max]`.
    pub fn next_wake(&self, now: DateTime<Utc>, reports: &[DeviceReport]) -> DateTime<Utc> {
        let reconciler = &self.inner.reconciler;
        let earliest = now + Duration::seconds(reconciler.min_recheck_secs());
        let latest = now + Duration::seconds(reconciler.max_recheck_secs());

        reports
            .iter()
            .map(|r| r.next_eligible)
            .min()
            .map_or(latest, |wake| wake.clamp(earliest, latest))
    }

    /// Drive passes until `stop` flips to true or its sender goes away.
    ///
    /// The first pass starts immediately. A stop request never interrupts a
    /// running pass; it only cancels the wait for the next one.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!("Dispatch loop started");
        loop {
            if *stop.borrow_and_update() {
                break;
            }

            let now = Utc::now();
            let wake = match self.run_pass(now).await {
                Some(report) => report.next_wake,
                None => now + Duration::seconds(self.inner.reconciler.min_recheck_secs()),
            };
            let delay = (wake - Utc::now()).to_std().unwrap_or_default();
            debug!(next_wake = %wake, "Dispatch loop idle");

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            let stopped = loop {
                tokio::select! {
                    () = &mut sleep => break false,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow_and_update() {
                            break true;
                        }
                    }
                }
            };
            if stopped {
                break;
            }
        }
        info!("Dispatch loop stopped");
    }

    pub fn spawn(self, stop: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(stop).await })
    }
}

impl Inner {
    async fn process_device(&self, device: Device, now: DateTime<Utc>) -> DeviceReport {
        let due_at = self.next_eligible.lock().get(&device.id).copied();
        if let Some(due_at) = due_at
            && due_at > now
        {
            debug!(device_id = device.id, due_at = %due_at, "Device not due yet");
            return DeviceReport {
                device_id: device.id,
                next_eligible: due_at,
                outcome: DeviceOutcome::NotDue,
            };
        }

        let result = self.dispatch(&device, now).await;
        let next_eligible = match &result {
            Ok((plan, _)) => now + Duration::seconds(plan.next_recheck_secs),
            Err(_) => now + Duration::seconds(self.reconciler.min_recheck_secs()),
        };
        self.next_eligible.lock().insert(device.id, next_eligible);

        let outcome = match result {
            Ok((plan, commands)) => {
                info!(
                    device_id = device.id,
                    device = %device.name,
                    commands = commands.len(),
                    recheck_secs = plan.next_recheck_secs,
                    "Device reconciled"
                );
                DeviceOutcome::Applied { plan, commands }
            }
            Err(e) => {
                match &e {
                    DispatchError::UnresolvedOverlap { .. } => {
                        warn!(device_id = device.id, error = %e, "Skipping device");
                    }
                    DispatchError::DeviceUnavailable { .. }
                    | DispatchError::Configuration(_)
                    | DispatchError::Invalid(_)
                    | DispatchError::DeviceNotFound(_)
                    | DispatchError::ActionNotFound(_)
                    | DispatchError::ScheduleNotFound(_)
                    | DispatchError::Storage(_) => {
                        error!(device_id = device.id, error = %e, "Device pass failed");
                    }
                }
                DeviceOutcome::Failed(e)
            }
        };

        DeviceReport {
            device_id: device.id,
            next_eligible,
            outcome,
        }
    }

    fn session_for(&self, device: &Device) -> Result<Arc<DeviceSession>> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(&device.id) {
            return Ok(Arc::clone(session));
        }
        let driver = self.drivers.driver_for(device).map_err(|e| {
            DispatchError::Configuration(format!("no driver for device {}: {e:#}", device.id))
        })?;
        let session = Arc::new(DeviceSession::new(device.id, driver));
        sessions.insert(device.id, Arc::clone(&session));
        Ok(session)
    }

    async fn dispatch(&self, device: &Device, now: DateTime<Utc>) -> Result<(Plan, Vec<Command>)> {
        let device_id = device.id;
        let session = self.session_for(device)?;

        session
            .with_connection(|driver| async move {
                if self.check_status {
                    let status = driver
                        .status()
                        .await
                        .map_err(|e| DispatchError::unavailable(device_id, &e))?;
                    if !status.is_ok() {
                        return Err(DispatchError::DeviceUnavailable {
                            device_id,
                            reason: format!("status is {status}"),
                        });
                    }
                }

                let (schedules, actions) = tokio::try_join!(
                    self.repository.list_bound_schedules(device_id),
                    self.repository.list_actions_for_device(device_id),
                )
                .map_err(|e| DispatchError::storage(&e))?;

                let limits = Limits {
                    max_charge: driver
                        .max_charge_rate()
                        .await
                        .map_err(|e| DispatchError::unavailable(device_id, &e))?,
                    max_discharge: driver
                        .max_discharge_rate()
                        .await
                        .map_err(|e| DispatchError::unavailable(device_id, &e))?,
                };

                let plan = self
                    .reconciler
                    .reconcile(device_id, &schedules, &actions, limits, now)?;

                let commands = self.commands_for(&plan);
                for command in &commands {
                    self.apply(driver.as_ref(), device_id, *command).await?;
                }
                Ok((plan, commands))
            })
            .await
    }

    /// Winning commands plus an idle command for every type that just went quiet.
    fn commands_for(&self, plan: &Plan) -> Vec<Command> {
        let last = self.last_commands.lock();
        ActionType::all()
            .iter()
            .filter_map(|&action_type| match plan.decision_for(action_type) {
                Some(decision) => Some(decision.command()),
                None => last
                    .get(&(plan.device_id, action_type))
                    .filter(|previous| !previous.is_idle())
                    .map(|_| action_type.idle_command()),
            })
            .collect()
    }

    async fn apply(
        &self,
        driver: &dyn DeviceDriver,
        device_id: DeviceId,
        command: Command,
    ) -> Result<()> {
        info!(device_id, driver = driver.name(), %command, "Dispatching command");
        match command {
            Command::Charge { watts } => driver
                .charge_battery(watts)
                .await
                .map_err(|e| DispatchError::unavailable(device_id, &e))?,
        }
        self.last_commands
            .lock()
            .insert((device_id, command.action_type()), command);
        Ok(())
    }
}
