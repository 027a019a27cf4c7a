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

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use fluxion_dispatch_types::schedule::validate_time_zone;
use fluxion_dispatch_types::{
    Action, ActionId, ActionType, BoundSchedule, Device, DeviceId, NewAction, Schedule,
    ScheduleId, ScheduleItem, ScheduleType, ValidationError,
};

use crate::error::DispatchError;
use crate::traits::{DispatchRepository, DispatchStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    device_id: DeviceId,
    schedule_id: ScheduleId,
    order: i32,
}

#[derive(Debug, Default)]
struct Tables {
    devices: BTreeMap<DeviceId, Device>,
    actions: BTreeMap<ActionId, Action>,
    schedules: BTreeMap<ScheduleId, Schedule>,
    bindings: Vec<Binding>,
    last_action_id: ActionId,
    last_schedule_id: ScheduleId,
}

impl Tables {
    fn action(&self, id: ActionId) -> Result<&Action> {
        self.actions
            .get(&id)
            .ok_or_else(|| DispatchError::ActionNotFound(id).into())
    }

    fn schedule_mut(&mut self, id: ScheduleId) -> Result<&mut Schedule> {
        self.schedules
            .get_mut(&id)
            .ok_or_else(|| DispatchError::ScheduleNotFound(id).into())
    }
}

/// Id-indexed store kept entirely in memory.
///
/// Updates replace whole records, so readers always see either the old or the
/// new version of an action.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Terminate `action` at `when`, keeping an earlier termination if it has one
pub fn end_no_later_than(action: &Action, when: DateTime<Utc>) -> Action {
    let when = action.deleted_at.map_or(when, |existing| existing.min(when));
    action.ended_at(when)
}

#[async_trait]
impl DispatchRepository for InMemoryStore {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.tables.read().devices.values().cloned().collect())
    }

    async fn list_bound_schedules(&self, device_id: DeviceId) -> Result<Vec<BoundSchedule>> {
        let tables = self.tables.read();
        let mut bindings: Vec<Binding> = tables
            .bindings
            .iter()
            .filter(|b| b.device_id == device_id)
            .copied()
            .collect();
        bindings.sort_by_key(|b| (b.order, b.schedule_id));

        Ok(bindings
            .into_iter()
            .filter_map(|b| {
                tables.schedules.get(&b.schedule_id).map(|s| BoundSchedule {
                    order: b.order,
                    schedule: s.clone(),
                })
            })
            .collect())
    }

    async fn list_actions_for_device(&self, device_id: DeviceId) -> Result<Vec<Action>> {
        Ok(self
            .tables
            .read()
            .actions
            .values()
            .filter(|a| a.device_id == device_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn upsert_device(&self, device: Device) -> Result<()> {
        self.tables.write().devices.insert(device.id, device);
        Ok(())
    }

    async fn create_action(&self, info: NewAction, now: DateTime<Utc>) -> Result<Action> {
        info.validate().map_err(DispatchError::from)?;
        let mut tables = self.tables.write();
        if !tables.devices.contains_key(&info.device_id) {
            return Err(DispatchError::DeviceNotFound(info.device_id).into());
        }
        tables.last_action_id += 1;
        let action = info.into_action(tables.last_action_id, now);
        tables.actions.insert(action.id, action.clone());
        debug!(action_id = action.id, device_id = action.device_id, "Action created");
        Ok(action)
    }

    async fn delete_action(&self, id: ActionId) -> Result<()> {
        self.tables
            .write()
            .actions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DispatchError::ActionNotFound(id).into())
    }

    async fn end_action_at(&self, id: ActionId, when: DateTime<Utc>) -> Result<Action> {
        let mut tables = self.tables.write();
        let ended = end_no_later_than(tables.action(id)?, when);
        tables.actions.insert(id, ended.clone());
        Ok(ended)
    }

    async fn split_action(
        &self,
        id: ActionId,
        end_at: DateTime<Utc>,
        resume_at: DateTime<Utc>,
    ) -> Result<Option<Action>> {
        if resume_at < end_at {
            return Err(DispatchError::from(ValidationError::SplitOrder).into());
        }
        let mut tables = self.tables.write();
        let original = tables.action(id)?.clone();

        if original.deleted_at.is_some_and(|d| d <= resume_at) {
            tables.actions.insert(id, end_no_later_than(&original, end_at));
            return Ok(None);
        }

        tables.last_action_id += 1;
        let copy = original.resumed_at(tables.last_action_id, resume_at);
        tables.actions.insert(id, end_no_later_than(&original, end_at));
        tables.actions.insert(copy.id, copy.clone());
        debug!(action_id = id, copy_id = copy.id, "Action split");
        Ok(Some(copy))
    }

    async fn list_actions_in_range(
        &self,
        device_id: DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        Ok(self
            .tables
            .read()
            .actions
            .values()
            .filter(|a| {
                a.device_id == device_id
                    && a.created_at <= end
                    && a.deleted_at.is_none_or(|d| start < d)
            })
            .cloned()
            .collect())
    }

    async fn create_schedule(
        &self,
        name: &str,
        kind: ScheduleType,
        time_zone: i64,
    ) -> Result<Schedule> {
        validate_time_zone(time_zone).map_err(DispatchError::from)?;
        let mut tables = self.tables.write();
        tables.last_schedule_id += 1;
        let schedule = Schedule {
            id: tables.last_schedule_id,
            name: name.to_owned(),
            kind,
            time_zone,
            items: Vec::new(),
        };
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Schedule> {
        self.tables
            .read()
            .schedules
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::ScheduleNotFound(id).into())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        Ok(self.tables.read().schedules.values().cloned().collect())
    }

    async fn set_time_zone(&self, id: ScheduleId, time_zone: i64) -> Result<()> {
        validate_time_zone(time_zone).map_err(DispatchError::from)?;
        self.tables.write().schedule_mut(id)?.time_zone = time_zone;
        Ok(())
    }

    async fn set_time_slot(&self, item: ScheduleItem) -> Result<()> {
        let mut tables = self.tables.write();
        let schedule = tables.schedule_mut(item.schedule_id)?;
        item.validate(schedule.kind).map_err(DispatchError::from)?;

        schedule
            .items
            .retain(|i| !(i.start_at == item.start_at && i.action_type == item.action_type));
        schedule.items.push(item);
        schedule.items.sort_by_key(|i| (i.start_at, i.action_type));
        Ok(())
    }

    async fn delete_time_slot(
        &self,
        id: ScheduleId,
        start_at: i64,
        action_type: ActionType,
    ) -> Result<()> {
        self.tables
            .write()
            .schedule_mut(id)?
            .items
            .retain(|i| !(i.start_at == start_at && i.action_type == action_type));
        Ok(())
    }

    async fn bind_schedule(&self, device_id: DeviceId, id: ScheduleId, order: i32) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.devices.contains_key(&device_id) {
            return Err(DispatchError::DeviceNotFound(device_id).into());
        }
        if !tables.schedules.contains_key(&id) {
            return Err(DispatchError::ScheduleNotFound(id).into());
        }
        tables
            .bindings
            .retain(|b| !(b.device_id == device_id && b.schedule_id == id));
        tables.bindings.push(Binding {
            device_id,
            schedule_id: id,
            order,
        });
        Ok(())
    }

    async fn unbind_schedule(&self, device_id: DeviceId, id: ScheduleId) -> Result<()> {
        self.tables
            .write()
            .bindings
            .retain(|b| !(b.device_id == device_id && b.schedule_id == id));
        Ok(())
    }
}
