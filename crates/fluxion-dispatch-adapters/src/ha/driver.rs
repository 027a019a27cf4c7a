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

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use fluxion_dispatch_core::DeviceDriver;
use fluxion_dispatch_types::{Device, DeviceStatus};

use super::client::HomeAssistantClient;
use super::errors::HaError;

/// Option written to the mode entity while a set-point is applied
pub const MODE_ACTIVE: &str = "Active";
/// Option written to the mode entity to hand control back to the inverter
pub const MODE_INACTIVE: &str = "Inactive";

/// Inverter controlled through a Home Assistant `number` set-point entity
///
/// HTTP is stateless, so connecting only verifies that the API answers.
#[derive(Debug)]
pub struct HaDeviceDriver {
    name: String,
    client: HomeAssistantClient,
    setpoint_entity: String,
    mode_entity: Option<String>,
    max_charge_w: i64,
    max_discharge_w: i64,
}

impl HaDeviceDriver {
    pub fn new(client: HomeAssistantClient, device: &Device) -> Result<Self> {
        let Some(setpoint_entity) = device.setpoint_entity.clone() else {
            return Err(HaError::MissingSetpointEntity {
                device_id: device.id,
            }
            .into());
        };
        Ok(Self {
            name: format!("home-assistant:{}", device.name),
            client,
            setpoint_entity,
            mode_entity: device.mode_entity.clone(),
            max_charge_w: device.max_charge_w,
            max_discharge_w: device.max_discharge_w,
        })
    }
}

#[async_trait]
impl DeviceDriver for HaDeviceDriver {
    async fn connect(&self) -> Result<()> {
        if !self.client.ping().await? {
            bail!("Home Assistant API is not reachable");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        debug!(driver = %self.name, "Nothing to close for HTTP driver");
        Ok(())
    }

    async fn status(&self) -> Result<DeviceStatus> {
        if !self.client.ping().await? {
            return Ok(DeviceStatus::Unreachable);
        }
        match self.client.get_state(&self.setpoint_entity).await {
            Ok(state) if state.is_available() => Ok(DeviceStatus::Ok),
            Ok(state) => Ok(DeviceStatus::Fault(format!(
                "{} is {}",
                self.setpoint_entity, state.state
            ))),
            Err(HaError::EntityNotFound(entity)) => {
                Ok(DeviceStatus::Fault(format!("{entity} does not exist")))
            }
            Err(e) => Err(e).context("reading set-point entity"),
        }
    }

    async fn max_charge_rate(&self) -> Result<i64> {
        Ok(self.max_charge_w)
    }

    async fn max_discharge_rate(&self) -> Result<i64> {
        Ok(self.max_discharge_w)
    }

    async fn charge_battery(&self, value: i64) -> Result<()> {
        info!(driver = %self.name, value, "Writing battery set-point");
        self.client
            .call_service(
                "number.set_value",
                json!({ "entity_id": self.setpoint_entity, "value": value }),
            )
            .await
            .with_context(|| format!("setting {}", self.setpoint_entity))?;

        if let Some(mode_entity) = &self.mode_entity {
            let option = if value == 0 { MODE_INACTIVE } else { MODE_ACTIVE };
            self.client
                .call_service(
                    "select.select_option",
                    json!({ "entity_id": mode_entity, "option": option }),
                )
                .await
                .with_context(|| format!("setting {mode_entity}"))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_dispatch_types::DriverKind;
    use mockito::{Matcher, Server};

    fn device(mode_entity: Option<&str>) -> Device {
        Device {
            id: 1,
            name: "garage".to_owned(),
            driver: DriverKind::HomeAssistant,
            max_charge_w: 5000,
            max_discharge_w: 4000,
            setpoint_entity: Some("number.battery_setpoint".to_owned()),
            mode_entity: mode_entity.map(str::to_owned),
        }
    }

    #[test]
    fn test_requires_setpoint_entity() {
        let client = HomeAssistantClient::new("http://localhost", "t").unwrap();
        let mut dev = device(None);
        dev.setpoint_entity = None;
        let err = HaDeviceDriver::new(client, &dev).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HaError>(),
            Some(HaError::MissingSetpointEntity { .. })
        ));
    }

    #[tokio::test]
    async fn test_charge_writes_setpoint_and_mode() {
        let mut server = Server::new_async().await;
        let setpoint = server
            .mock("POST", "/api/services/number/set_value")
            .match_body(Matcher::Json(json!({
                "entity_id": "number.battery_setpoint",
                "value": 2500
            })))
            .with_status(200)
            .create_async()
            .await;
        let mode = server
            .mock("POST", "/api/services/select/select_option")
            .match_body(Matcher::Json(json!({
                "entity_id": "select.battery_control",
                "option": "Active"
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let driver = HaDeviceDriver::new(client, &device(Some("select.battery_control"))).unwrap();
        driver.charge_battery(2500).await.unwrap();

        setpoint.assert_async().await;
        mode.assert_async().await;
    }

    #[tokio::test]
    async fn test_zero_releases_control() {
        let mut server = Server::new_async().await;
        let _setpoint = server
            .mock("POST", "/api/services/number/set_value")
            .with_status(200)
            .create_async()
            .await;
        let mode = server
            .mock("POST", "/api/services/select/select_option")
            .match_body(Matcher::PartialJson(json!({ "option": "Inactive" })))
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let driver = HaDeviceDriver::new(client, &device(Some("select.battery_control"))).unwrap();
        driver.charge_battery(0).await.unwrap();

        mode.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_reports_unavailable_entity() {
        let mut server = Server::new_async().await;
        let _ping = server.mock("GET", "/api/").with_status(200).create_async().await;
        let _state = server
            .mock("GET", "/api/states/number.battery_setpoint")
            .with_status(200)
            .with_body(
                json!({"entity_id": "number.battery_setpoint", "state": "unavailable"})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let driver = HaDeviceDriver::new(client, &device(None)).unwrap();

        assert!(matches!(
            driver.status().await.unwrap(),
            DeviceStatus::Fault(_)
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_when_api_down() {
        let mut server = Server::new_async().await;
        let _ping = server.mock("GET", "/api/").with_status(502).create_async().await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let driver = HaDeviceDriver::new(client, &device(None)).unwrap();

        assert!(driver.connect().await.is_err());
        assert_eq!(driver.status().await.unwrap(), DeviceStatus::Unreachable);
    }
}
