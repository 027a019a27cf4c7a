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

//! Log filter installed before configuration is read.
//!
//! Startup runs with `RUST_LOG` or `info` so the configuration loader can log.
//! The configured level replaces that filter once known, unless `RUST_LOG` is set.

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

const STARTUP_LEVEL: &str = "info";

#[derive(Debug)]
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogLevel {
    /// Switch to `level` unless the environment already chose a filter.
    pub fn apply(&self, level: &str) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        self.handle
            .reload(EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'"))?)
            .context("Failed to apply log level")
    }
}

fn subscriber(env_filter: Option<EnvFilter>) -> (impl Subscriber + Send + Sync, LogLevel) {
    let pinned = env_filter.is_some();
    let (filter, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(STARTUP_LEVEL)));
    let subscriber = Registry::default().with(filter).with(fmt::layer());
    (subscriber, LogLevel { handle, pinned })
}

/// Install the global subscriber.
#[must_use]
pub fn init() -> LogLevel {
    let (subscriber, level) = subscriber(EnvFilter::try_from_default_env().ok());
    subscriber.init();
    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_configured_level_replaces_startup_filter() {
        let (subscriber, level) = subscriber(None);
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));

            level.apply("debug").unwrap();
            assert!(tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn test_environment_filter_is_kept() {
        let (subscriber, level) = subscriber(Some(EnvFilter::new("warn")));
        tracing::subscriber::with_default(subscriber, || {
            level.apply("debug").unwrap();
            assert!(!tracing::enabled!(Level::INFO));
            assert!(tracing::enabled!(Level::WARN));
        });
    }
}
