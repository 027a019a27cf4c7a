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

//! SQLite-backed [`DispatchStore`].

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use fluxion_dispatch_core::store::end_no_later_than;
use fluxion_dispatch_core::{DispatchError, DispatchRepository, DispatchStore};
use fluxion_dispatch_types::schedule::validate_time_zone;
use fluxion_dispatch_types::{
    Action, ActionId, ActionType, BoundSchedule, Device, DeviceId, NewAction, Schedule,
    ScheduleId, ScheduleItem, ScheduleType, ValidationError,
};

const ACTION_COLUMNS: &str = "id, device_id, action_type, value, active_from, active_until, \
                              repeat_weekly, created_at, deleted_at";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn =
            Connection::open(path).with_context(|| format!("Failed to open database: {path}"))?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS devices (
                id               INTEGER PRIMARY KEY,
                name             TEXT NOT NULL,
                driver           TEXT NOT NULL,
                max_charge_w     INTEGER NOT NULL,
                max_discharge_w  INTEGER NOT NULL,
                setpoint_entity  TEXT,
                mode_entity      TEXT
            );

            CREATE TABLE IF NOT EXISTS actions (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id      INTEGER NOT NULL,
                action_type    TEXT NOT NULL,
                value          INTEGER NOT NULL,
                active_from    TEXT NOT NULL,
                active_until   TEXT NOT NULL,
                repeat_weekly  INTEGER NOT NULL DEFAULT 0,
                created_at     TEXT NOT NULL,
                deleted_at     TEXT,
                FOREIGN KEY (device_id) REFERENCES devices(id)
            );

            CREATE INDEX IF NOT EXISTS idx_actions_device ON actions(device_id);

            CREATE TABLE IF NOT EXISTS schedules (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL,
                type       TEXT NOT NULL,
                time_zone  INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS schedule_items (
                schedule_id  INTEGER NOT NULL,
                start_at     INTEGER NOT NULL,
                end_at       INTEGER,
                action_type  TEXT NOT NULL,
                value        INTEGER NOT NULL,
                UNIQUE (schedule_id, start_at, action_type),
                FOREIGN KEY (schedule_id) REFERENCES schedules(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS device_schedules (
                device_id    INTEGER NOT NULL,
                schedule_id  INTEGER NOT NULL,
                sort_order   INTEGER NOT NULL DEFAULT 0,
                UNIQUE (device_id, schedule_id),
                FOREIGN KEY (device_id) REFERENCES devices(id),
                FOREIGN KEY (schedule_id) REFERENCES schedules(id) ON DELETE CASCADE
            );",
        )
        .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn devices(&self) -> Result<Vec<Device>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, driver, max_charge_w, max_discharge_w, setpoint_entity, mode_entity
             FROM devices ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Device {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    driver: parse_column(row, 2)?,
                    max_charge_w: row.get(3)?,
                    max_discharge_w: row.get(4)?,
                    setpoint_entity: row.get(5)?,
                    mode_entity: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn bound_schedules(&self, device_id: DeviceId) -> Result<Vec<BoundSchedule>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT b.sort_order, s.id, s.name, s.type, s.time_zone
             FROM device_schedules b JOIN schedules s ON s.id = b.schedule_id
             WHERE b.device_id = ?1
             ORDER BY b.sort_order, s.id",
        )?;
        let bound = stmt
            .query_map([device_id], |row| {
                Ok(BoundSchedule {
                    order: row.get(0)?,
                    schedule: schedule_from_row(row, 1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        bound
            .into_iter()
            .map(|mut b| {
                b.schedule.items = load_items(&conn, b.schedule.id)?;
                Ok(b)
            })
            .collect()
    }

    fn actions_for_device(&self, device_id: DeviceId) -> Result<Vec<Action>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE device_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([device_id], action_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn schedule(&self, id: ScheduleId) -> Result<Schedule> {
        let conn = self.conn.lock();
        let mut schedule = conn
            .query_row(
                "SELECT id, name, type, time_zone FROM schedules WHERE id = ?1",
                [id],
                |row| schedule_from_row(row, 0),
            )
            .optional()?
            .ok_or(DispatchError::ScheduleNotFound(id))?;
        schedule.items = load_items(&conn, id)?;
        Ok(schedule)
    }

    fn schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, type, time_zone FROM schedules ORDER BY id")?;
        let schedules = stmt
            .query_map([], |row| schedule_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;

        schedules
            .into_iter()
            .map(|mut s| {
                s.items = load_items(&conn, s.id)?;
                Ok(s)
            })
            .collect()
    }
}

/// Read a text column through the type's `FromStr`
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ValidationError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn action_from_row(row: &Row<'_>) -> rusqlite::Result<Action> {
    Ok(Action {
        id: row.get(0)?,
        device_id: row.get(1)?,
        action_type: parse_column(row, 2)?,
        value: row.get(3)?,
        active_from: row.get(4)?,
        active_until: row.get(5)?,
        repeat_weekly: row.get(6)?,
        created_at: row.get(7)?,
        deleted_at: row.get(8)?,
    })
}

/// Schedule header starting at column `offset`, without items
fn schedule_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        kind: parse_column(row, offset + 2)?,
        time_zone: row.get(offset + 3)?,
        items: Vec::new(),
    })
}

fn load_items(conn: &Connection, schedule_id: ScheduleId) -> Result<Vec<ScheduleItem>> {
    let mut stmt = conn.prepare(
        "SELECT schedule_id, start_at, end_at, action_type, value
         FROM schedule_items WHERE schedule_id = ?1
         ORDER BY start_at, action_type",
    )?;
    let items = stmt
        .query_map([schedule_id], |row| {
            Ok(ScheduleItem {
                schedule_id: row.get(0)?,
                start_at: row.get(1)?,
                end_at: row.get(2)?,
                action_type: parse_column(row, 3)?,
                value: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn fetch_action(conn: &Connection, id: ActionId) -> Result<Action> {
    conn.query_row(
        &format!("SELECT {ACTION_COLUMNS} FROM actions WHERE id = ?1"),
        [id],
        action_from_row,
    )
    .optional()?
    .ok_or_else(|| DispatchError::ActionNotFound(id).into())
}

/// Insert `action` under a fresh id and return it
fn insert_action(conn: &Connection, action: &Action) -> Result<Action> {
    conn.execute(
        "INSERT INTO actions (device_id, action_type, value, active_from, active_until, repeat_weekly, created_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            action.device_id,
            action.action_type.as_str(),
            action.value,
            action.active_from,
            action.active_until,
            action.repeat_weekly,
            action.created_at,
            action.deleted_at,
        ],
    )?;
    Ok(Action {
        id: conn.last_insert_rowid(),
        ..action.clone()
    })
}

fn write_deleted_at(conn: &Connection, action: &Action) -> Result<()> {
    conn.execute(
        "UPDATE actions SET deleted_at = ?1 WHERE id = ?2",
        params![action.deleted_at, action.id],
    )?;
    Ok(())
}

fn device_exists(conn: &Connection, id: DeviceId) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM devices WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

fn schedule_kind(conn: &Connection, id: ScheduleId) -> Result<ScheduleType> {
    conn.query_row("SELECT type FROM schedules WHERE id = ?1", [id], |row| {
        parse_column(row, 0)
    })
    .optional()?
    .ok_or_else(|| DispatchError::ScheduleNotFound(id).into())
}

#[async_trait]
impl DispatchRepository for SqliteStore {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        self.devices()
    }

    async fn list_bound_schedules(&self, device_id: DeviceId) -> Result<Vec<BoundSchedule>> {
        self.bound_schedules(device_id)
    }

    async fn list_actions_for_device(&self, device_id: DeviceId) -> Result<Vec<Action>> {
        self.actions_for_device(device_id)
    }
}

#[async_trait]
impl DispatchStore for SqliteStore {
    async fn upsert_device(&self, device: Device) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO devices (id, name, driver, max_charge_w, max_discharge_w, setpoint_entity, mode_entity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = ?2,
                driver = ?3,
                max_charge_w = ?4,
                max_discharge_w = ?5,
                setpoint_entity = ?6,
                mode_entity = ?7",
            params![
                device.id,
                device.name,
                device.driver.to_config_value(),
                device.max_charge_w,
                device.max_discharge_w,
                device.setpoint_entity,
                device.mode_entity,
            ],
        )?;
        Ok(())
    }

    async fn create_action(&self, info: NewAction, now: DateTime<Utc>) -> Result<Action> {
        info.validate().map_err(DispatchError::from)?;
        let conn = self.conn.lock();
        if !device_exists(&conn, info.device_id)? {
            return Err(DispatchError::DeviceNotFound(info.device_id).into());
        }
        let action = insert_action(&conn, &info.into_action(0, now))?;
        debug!(action_id = action.id, device_id = action.device_id, "Action created");
        Ok(action)
    }

    async fn delete_action(&self, id: ActionId) -> Result<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM actions WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(DispatchError::ActionNotFound(id).into());
        }
        Ok(())
    }

    async fn end_action_at(&self, id: ActionId, when: DateTime<Utc>) -> Result<Action> {
        let conn = self.conn.lock();
        let ended = end_no_later_than(&fetch_action(&conn, id)?, when);
        write_deleted_at(&conn, &ended)?;
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
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let original = fetch_action(&tx, id)?;

        let copy = if original.deleted_at.is_some_and(|d| d <= resume_at) {
            None
        } else {
            Some(insert_action(&tx, &original.resumed_at(0, resume_at))?)
        };
        write_deleted_at(&tx, &end_no_later_than(&original, end_at))?;
        tx.commit()?;

        if let Some(copy) = &copy {
            debug!(action_id = id, copy_id = copy.id, "Action split");
        }
        Ok(copy)
    }

    async fn list_actions_in_range(
        &self,
        device_id: DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        // Timestamps compare as instants, not as stored text
        Ok(self
            .actions_for_device(device_id)?
            .into_iter()
            .filter(|a| a.created_at <= end && a.deleted_at.is_none_or(|d| start < d))
            .collect())
    }

    async fn create_schedule(
        &self,
        name: &str,
        kind: ScheduleType,
        time_zone: i64,
    ) -> Result<Schedule> {
        validate_time_zone(time_zone).map_err(DispatchError::from)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO schedules (name, type, time_zone) VALUES (?1, ?2, ?3)",
            params![name, kind.to_config_value(), time_zone],
        )?;
        Ok(Schedule {
            id: conn.last_insert_rowid(),
            name: name.to_owned(),
            kind,
            time_zone,
            items: Vec::new(),
        })
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Schedule> {
        self.schedule(id)
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        self.schedules()
    }

    async fn set_time_zone(&self, id: ScheduleId, time_zone: i64) -> Result<()> {
        validate_time_zone(time_zone).map_err(DispatchError::from)?;
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE schedules SET time_zone = ?1 WHERE id = ?2",
            params![time_zone, id],
        )?;
        if updated == 0 {
            return Err(DispatchError::ScheduleNotFound(id).into());
        }
        Ok(())
    }

    async fn set_time_slot(&self, item: ScheduleItem) -> Result<()> {
        let conn = self.conn.lock();
        let kind = schedule_kind(&conn, item.schedule_id)?;
        item.validate(kind).map_err(DispatchError::from)?;

        conn.execute(
            "INSERT INTO schedule_items (schedule_id, start_at, end_at, action_type, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(schedule_id, start_at, action_type) DO UPDATE SET
                end_at = ?3,
                value = ?5",
            params![
                item.schedule_id,
                item.start_at,
                item.end_at,
                item.action_type.as_str(),
                item.value,
            ],
        )?;
        Ok(())
    }

    async fn delete_time_slot(
        &self,
        id: ScheduleId,
        start_at: i64,
        action_type: ActionType,
    ) -> Result<()> {
        let conn = self.conn.lock();
        schedule_kind(&conn, id)?;
        conn.execute(
            "DELETE FROM schedule_items WHERE schedule_id = ?1 AND start_at = ?2 AND action_type = ?3",
            params![id, start_at, action_type.as_str()],
        )?;
        Ok(())
    }

    async fn bind_schedule(&self, device_id: DeviceId, id: ScheduleId, order: i32) -> Result<()> {
        let conn = self.conn.lock();
        if !device_exists(&conn, device_id)? {
            return Err(DispatchError::DeviceNotFound(device_id).into());
        }
        schedule_kind(&conn, id)?;
        conn.execute(
            "INSERT INTO device_schedules (device_id, schedule_id, sort_order) VALUES (?1, ?2, ?3)
             ON CONFLICT(device_id, schedule_id) DO UPDATE SET sort_order = ?3",
            params![device_id, id, order],
        )?;
        Ok(())
    }

    async fn unbind_schedule(&self, device_id: DeviceId, id: ScheduleId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM device_schedules WHERE device_id = ?1 AND schedule_id = ?2",
            params![device_id, id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fluxion_dispatch_types::DriverKind;

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()
    }

    fn device(id: DeviceId) -> Device {
        Device {
            id,
            name: format!("battery-{id}"),
            driver: DriverKind::Simulated,
            max_charge_w: 5000,
            max_discharge_w: 4000,
            setpoint_entity: None,
            mode_entity: None,
        }
    }

    fn weekly(device_id: DeviceId) -> NewAction {
        NewAction {
            device_id,
            action_type: ActionType::Charge,
            value: 1200,
            active_from: monday(),
            active_until: monday() + Duration::hours(6),
            repeat_weekly: true,
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        let path = dir.path().join("nested").join("dispatch.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        store.upsert_device(device(1)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_device_upsert_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut updated = device(1);
        updated.max_charge_w = 3000;
        updated.driver = DriverKind::HomeAssistant;
        updated.setpoint_entity = Some("number.setpoint".to_owned());
        store.upsert_device(updated.clone()).await.unwrap();

        assert_eq!(store.list_devices().await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_action_round_trips_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let created = store.create_action(weekly(1), monday()).await.unwrap();
        let listed = store.list_actions_for_device(1).await.unwrap();

        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(listed[0].active_until, monday() + Duration::hours(6));
        assert!(listed[0].repeat_weekly);
        assert_eq!(listed[0].deleted_at, None);
    }

    #[tokio::test]
    async fn test_create_action_requires_device() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let err = store.create_action(weekly(9), monday()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::DeviceNotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_end_keeps_earlier_termination() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let action = store.create_action(weekly(1), monday()).await.unwrap();

        let first = store
            .end_action_at(action.id, monday() + Duration::days(1))
            .await
            .unwrap();
        let second = store
            .end_action_at(action.id, monday() + Duration::days(3))
            .await
            .unwrap();

        assert_eq!(first.deleted_at, Some(monday() + Duration::days(1)));
        assert_eq!(second.deleted_at, first.deleted_at);
    }

    #[tokio::test]
    async fn test_skip_weeks_splits_action() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let action = store.create_action(weekly(1), monday()).await.unwrap();
        let from = monday() + Duration::weeks(2);

        let copy = store
            .skip_weeks(action.id, from, 1)
            .await
            .unwrap()
            .expect("copy created");

        assert_ne!(copy.id, action.id);
        assert_eq!(copy.created_at, from + Duration::weeks(1));
        assert_eq!(copy.active_from, action.active_from);
        assert_eq!(copy.deleted_at, None);

        let actions = store.list_actions_for_device(1).await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].deleted_at, Some(from));
    }

    #[tokio::test]
    async fn test_split_of_ended_action_creates_no_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let action = store.create_action(weekly(1), monday()).await.unwrap();
        store
            .end_action_at(action.id, monday() + Duration::weeks(1))
            .await
            .unwrap();

        let copy = store
            .split_action(
                action.id,
                monday() + Duration::days(2),
                monday() + Duration::weeks(2),
            )
            .await
            .unwrap();

        assert!(copy.is_none());
        let actions = store.list_actions_for_device(1).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].deleted_at, Some(monday() + Duration::days(2)));
    }

    #[tokio::test]
    async fn test_split_rejects_reversed_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let action = store.create_action(weekly(1), monday()).await.unwrap();

        let result = store
            .split_action(action.id, monday() + Duration::days(2), monday())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_actions_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let early = store.create_action(weekly(1), monday()).await.unwrap();
        store
            .end_action_at(early.id, monday() + Duration::days(1))
            .await
            .unwrap();
        let late = store
            .create_action(weekly(1), monday() + Duration::days(5))
            .await
            .unwrap();

        let in_range = store
            .list_actions_in_range(1, monday() + Duration::days(2), monday() + Duration::days(6))
            .await
            .unwrap();

        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, late.id);
    }

    #[tokio::test]
    async fn test_delete_missing_action() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(store.delete_action(17).await.is_err());
    }

    #[tokio::test]
    async fn test_schedule_slots_upsert_and_bind() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let schedule = store
            .create_schedule("night", ScheduleType::Day, 3600)
            .await
            .unwrap();

        let slot = ScheduleItem {
            schedule_id: schedule.id,
            start_at: 3600,
            end_at: Some(7200),
            action_type: ActionType::Charge,
            value: 800,
        };
        store.set_time_slot(slot.clone()).await.unwrap();
        store
            .set_time_slot(ScheduleItem { value: 900, ..slot.clone() })
            .await
            .unwrap();
        store
            .set_time_slot(ScheduleItem {
                start_at: 0,
                end_at: None,
                value: 100,
                ..slot.clone()
            })
            .await
            .unwrap();

        store.bind_schedule(1, schedule.id, 3).await.unwrap();
        let bound = store.list_bound_schedules(1).await.unwrap();

        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].order, 3);
        assert_eq!(bound[0].schedule.time_zone, 3600);
        let starts: Vec<i64> = bound[0].schedule.items.iter().map(|i| i.start_at).collect();
        assert_eq!(starts, vec![0, 3600]);
        assert_eq!(bound[0].schedule.items[1].value, 900);

        store
            .delete_time_slot(schedule.id, 0, ActionType::Charge)
            .await
            .unwrap();
        store.unbind_schedule(1, schedule.id).await.unwrap();

        assert_eq!(store.get_schedule(schedule.id).await.unwrap().items.len(), 1);
        assert!(store.list_bound_schedules(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slot_outside_cycle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let schedule = store
            .create_schedule("day", ScheduleType::Day, 0)
            .await
            .unwrap();

        let result = store
            .set_time_slot(ScheduleItem {
                schedule_id: schedule.id,
                start_at: 90_000,
                end_at: None,
                action_type: ActionType::Charge,
                value: 1,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteStore::open(path).unwrap();
            store.upsert_device(device(1)).await.unwrap();
            store.create_action(weekly(1), monday()).await.unwrap();
            store
                .create_schedule("week", ScheduleType::Week, -3600)
                .await
                .unwrap();
        }

        let store = SqliteStore::open(path).unwrap();
        assert_eq!(store.list_actions_for_device(1).await.unwrap().len(), 1);
        let schedules = store.list_schedules().await.unwrap();
        assert_eq!(schedules[0].kind, ScheduleType::Week);
        assert_eq!(schedules[0].time_zone, -3600);
    }
}
