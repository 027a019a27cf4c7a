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

//! Device drivers for the dispatch engine.

pub mod ha;
pub mod registry;
pub mod simulated;

pub use ha::{HaDeviceDriver, HaError, HaResult, HomeAssistantClient};
pub use registry::DriverRegistry;
pub use simulated::SimulatedDevice;
