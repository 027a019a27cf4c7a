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

//! Error types for the dispatch engine

use fluxion_dispatch_types::{ActionId, ActionType, DeviceId, ScheduleId, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unresolved overlap for '{action_type}' on device {device_id}: {detail}")]
    UnresolvedOverlap {
        device_id: DeviceId,
        action_type: ActionType,
        detail: String,
    },

    #[error("device {device_id} unavailable: {reason}")]
    DeviceUnavailable { device_id: DeviceId, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),

    #[error("action {0} not found")]
    ActionNotFound(ActionId),

    #[error("schedule {0} not found")]
    ScheduleNotFound(ScheduleId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DispatchError {
    pub fn unavailable(device_id: DeviceId, err: &anyhow::Error) -> Self {
        Self::DeviceUnavailable {
            device_id,
            reason: format!("{err:#}"),
        }
    }

    pub fn storage(err: &anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
