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

//! Temporal reconciliation engine for battery inverters.
//!
//! The [`PollLoop`] periodically asks the [`Reconciler`] which one-off actions,
//! weekly actions and schedule items govern each device, and hands the winning
//! command to the device's [`DeviceDriver`] inside a [`DeviceSession`].

pub mod error;
pub mod poll_loop;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod traits;

#[cfg(test)]
mod testing;

pub use error::{DispatchError, Result};
pub use poll_loop::{DeviceOutcome, DeviceReport, LoopSettings, PassReport, PollLoop};
pub use reconciler::{
    Candidate, Decision, Limits, MAX_RECHECK_SECS, MIN_RECHECK_SECS, Plan, Reconciler, Source,
};
pub use session::DeviceSession;
pub use store::InMemoryStore;
pub use traits::{DeviceDriver, DispatchRepository, DispatchStore, DriverProvider};
