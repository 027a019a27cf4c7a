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

use thiserror::Error;

/// Record-level validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Action window is empty: active_from must be before active_until")]
    EmptyWindow,

    #[error("Split must resume at or after the point it ends")]
    SplitOrder,

    #[error("Offset {offset}s is outside the {range}s cycle")]
    OffsetOutOfCycle { offset: i64, range: i64 },

    #[error("Unknown action type: '{0}'")]
    UnknownActionType(String),

    #[error("Unknown schedule type: '{0}'")]
    UnknownScheduleType(String),

    #[error("Unknown driver kind: '{0}'")]
    UnknownDriver(String),

    #[error("Time zone offset {0}s is outside +/-14h")]
    TimeZoneOutOfRange(i64),
}
