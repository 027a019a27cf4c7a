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

//! Plain records shared by the dispatch engine and its collaborators.
//!
//! Besides the records themselves this crate holds the pure time math:
//! - [`window`]: activity of absolute and weekly-repeating action windows
//! - [`cycle`]: positions and boundaries on a schedule's repeating axis

pub mod action;
pub mod cycle;
pub mod device;
pub mod schedule;
pub mod validation;
pub mod window;

// Re-export common types for convenience
pub use action::{Action, ActionId, ActionType, Command, NewAction};
pub use cycle::CycleDescriptor;
pub use device::{Device, DeviceId, DeviceStatus, DriverKind};
pub use schedule::{BoundSchedule, Schedule, ScheduleId, ScheduleItem, ScheduleType};
pub use validation::ValidationError;
pub use window::{DisplayWindow, WEEK_MS};
