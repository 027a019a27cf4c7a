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

use fluxion_dispatch_types::DeviceId;
use thiserror::Error;

/// Failures talking to Home Assistant on behalf of a device
#[derive(Error, Debug)]
pub enum HaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Home Assistant returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Entity '{0}' does not exist")]
    EntityNotFound(String),

    #[error("Service name '{0}' must look like 'domain.service'")]
    InvalidServiceName(String),

    #[error("Service {service} rejected the call: {reason}")]
    ServiceRejected { service: String, reason: String },

    #[error("Token rejected by Home Assistant")]
    Unauthorized,

    #[error("Device {device_id} has no setpoint_entity for the home-assistant driver")]
    MissingSetpointEntity { device_id: DeviceId },

    #[error("Client setup failed: {0}")]
    Setup(String),
}

pub type HaResult<T> = Result<T, HaError>;
