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

//! Reference-counted device connections.
//!
//! The first holder connects, the last one disconnects. Release is an explicit
//! step of [`DeviceSession::with_connection`] that runs after the body returns,
//! whatever it returned.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use fluxion_dispatch_types::DeviceId;

use crate::error::{DispatchError, Result};
use crate::traits::DeviceDriver;

pub struct DeviceSession {
    device_id: DeviceId,
    driver: Arc<dyn DeviceDriver>,
    holders: Mutex<usize>,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device_id", &self.device_id)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    pub fn new(device_id: DeviceId, driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            device_id,
            driver,
            holders: Mutex::new(0),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Number of callers currently inside [`Self::with_connection`]
    pub async fn holders(&self) -> usize {
        *self.holders.lock().await
    }

    async fn acquire(&self) -> Result<()> {
        let mut holders = self.holders.lock().await;
        if *holders == 0 {
            debug!(device_id = self.device_id, driver = self.driver.name(), "Connecting");
            self.driver
                .connect()
                .await
                .map_err(|e| DispatchError::unavailable(self.device_id, &e))?;
        }
        *holders += 1;
        Ok(())
    }

    async fn release(&self) {
        let mut holders = self.holders.lock().await;
        match *holders {
            0 => warn!(device_id = self.device_id, "Session released more often than acquired"),
            1 => {
                *holders = 0;
                debug!(device_id = self.device_id, "Disconnecting");
                if let Err(e) = self.driver.disconnect().await {
                    warn!(device_id = self.device_id, error = %e, "Disconnect failed");
                }
            }
            n => *holders = n - 1,
        }
    }

    /// Run `body` with an open connection.
    ///
    /// The connection is released once `body` completes, on success and error alike.
    /// A panic inside `body` or dropping this future midway skips the release and
    /// leaves the holder count raised, so the session must be discarded then.
    pub async fn with_connection<T, F, Fut>(&self, body: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn DeviceDriver>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.acquire().await?;
        let outcome = body(Arc::clone(&self.driver)).await;
        self.release().await;
        outcome
    }
}
