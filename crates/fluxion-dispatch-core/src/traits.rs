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
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use fluxion_dispatch_types::{
    Action, ActionId, ActionType, BoundSchedule, Device, DeviceId, DeviceStatus, NewAction,
    Schedule, ScheduleId, ScheduleItem, ScheduleType,
};

/// Read side of storage, the only view the poll loop has of persisted state.
#[async_trait]
pub trait DispatchRepository: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Schedules bound to the device, with items, ascending by binding order
    async fn list_bound_schedules(&self, device_id: DeviceId) -> Result<Vec<BoundSchedule>>;

    async fn list_actions_for_device(&self, device_id: DeviceId) -> Result<Vec<Action>>;
}

/// Management operations behind the CLI and config seeding.
///
/// Records are replaced, never edited in place.
#[async_trait]
pub trait DispatchStore: DispatchRepository {
    async fn upsert_device(&self, device: Device) -> Result<()>;

    async fn create_action(&self, info: NewAction, now: DateTime<Utc>) -> Result<Action>;

    async fn delete_action(&self, id: ActionId) -> Result<()>;

    /// Terminate the action at `when`
    async fn end_action_at(&self, id: ActionId, when: DateTime<Utc>) -> Result<Action>;

    /// End the action at `end_at` and carry it on from `resume_at` as a new record.
    ///
    /// Returns the copy, or `None` when the action already stops by `resume_at`.
    async fn split_action(
        &self,
        id: ActionId,
        end_at: DateTime<Utc>,
        resume_at: DateTime<Utc>,
    ) -> Result<Option<Action>>;

    /// Carve `weeks` whole weeks out of a repeating action, starting at `from`
    async fn skip_weeks(
        &self,
        id: ActionId,
        from: DateTime<Utc>,
        weeks: u32,
    ) -> Result<Option<Action>> {
        let resume_at = from + Duration::weeks(i64::from(weeks.max(1)));
        self.split_action(id, from, resume_at).await
    }

    /// Actions of the device that exist at some point of `[start, end]`
    async fn list_actions_in_range(
        &self,
        device_id: DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Action>>;

    async fn create_schedule(
        &self,
        name: &str,
        kind: ScheduleType,
        time_zone: i64,
    ) -> Result<Schedule>;

    async fn get_schedule(&self, id: ScheduleId) -> Result<Schedule>;

    async fn list_schedules(&self) -> Result<Vec<Schedule>>;

    async fn set_time_zone(&self, id: ScheduleId, time_zone: i64) -> Result<()>;

    /// Insert or replace the item keyed by `(schedule, start_at, action_type)`
    async fn set_time_slot(&self, item: ScheduleItem) -> Result<()>;

    async fn delete_time_slot(
        &self,
        id: ScheduleId,
        start_at: i64,
        action_type: ActionType,
    ) -> Result<()>;

    async fn bind_schedule(&self, device_id: DeviceId, id: ScheduleId, order: i32) -> Result<()>;

    async fn unbind_schedule(&self, device_id: DeviceId, id: ScheduleId) -> Result<()>;
}

/// Capability set of a physical device
///
/// Implementations own their I/O timeouts.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn status(&self) -> Result<DeviceStatus>;

    async fn max_charge_rate(&self) -> Result<i64>;

    /// Positive number of watts
    async fn max_discharge_rate(&self) -> Result<i64>;

    /// Apply a set-point; negative values discharge, zero releases control
    async fn charge_battery(&self, value: i64) -> Result<()>;

    /// Get driver name for logging
    fn name(&self) -> &str;
}

/// Builds the driver for a device.
pub trait DriverProvider: Send + Sync {
    fn driver_for(&self, device: &Device) -> Result<Arc<dyn DeviceDriver>>;
}
