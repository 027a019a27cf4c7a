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

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::errors::{HaError, HaResult};
use super::types::HaEntityState;

const DEFAULT_BASE_URL: &str = "http://localhost:8123";

/// Minimal Home Assistant REST client for writing inverter set-points
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::Setup(format!("Failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Build from configured values, falling back to `HA_BASE_URL` and `HA_TOKEN`
    pub fn from_config(base_url: Option<String>, token: Option<String>) -> HaResult<Self> {
        let base_url = base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        let token = token
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .ok_or_else(|| {
                HaError::Setup(
                    "HA token not found in config or HA_TOKEN environment variable".to_owned(),
                )
            })?;

        info!("Initializing HA client for {}", base_url);
        Self::new(base_url, token)
    }

    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub async fn get_state(&self, entity_id: &str) -> HaResult<HaEntityState> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        debug!("[HA QUERY] {}", entity_id);

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<HaEntityState>().await?),
            StatusCode::NOT_FOUND => Err(HaError::EntityNotFound(entity_id.to_owned())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::Unauthorized),
            status => {
                let message = response.text().await.unwrap_or_default();
                error!("[HA QUERY] {} failed with status {}: {}", entity_id, status, message);
                Err(HaError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Call a Home Assistant service given as "domain.service"
    pub async fn call_service(&self, service: &str, data: Value) -> HaResult<()> {
        let Some((domain, name)) = service
            .split_once('.')
            .filter(|(d, n)| !d.is_empty() && !n.is_empty() && !n.contains('.'))
        else {
            return Err(HaError::InvalidServiceName(service.to_owned()));
        };

        let url = format!("{}/api/services/{}/{}", self.base_url, domain, name);
        info!("[HA SERVICE] {} {}", service, data);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(&data)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::Unauthorized),
            status => {
                let reason = response.text().await.unwrap_or_default();
                error!("[HA SERVICE] {} failed (status: {}): {}", service, status, reason);
                Err(HaError::ServiceRejected {
                    service: service.to_owned(),
                    reason,
                })
            }
        }
    }

    /// Health check; transport errors count as unhealthy rather than failing
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url);
        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("HA health check failed: status {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("HA health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> HaResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(HaError::Http(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_state_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/number.battery_setpoint")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "entity_id": "number.battery_setpoint",
                    "state": "1500",
                    "attributes": {"max": 5000}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let state = client.get_state("number.battery_setpoint").await.unwrap();

        assert_eq!(state.state, "1500");
        assert!(state.is_available());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/number.missing")
            .with_status(404)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client.get_state("number.missing").await;

        assert!(matches!(result, Err(HaError::EntityNotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_call_service_posts_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/services/number/set_value")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "entity_id": "number.battery_setpoint",
                "value": -2000
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(format!("{}/", server.url()), "test_token").unwrap();
        client
            .call_service(
                "number.set_value",
                json!({"entity_id": "number.battery_setpoint", "value": -2000}),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_call_service_invalid_format() {
        let client = HomeAssistantClient::new("http://localhost", "token").unwrap();
        for service in ["invalid", "number.", ".set_value", "a.b.c"] {
            let result = client.call_service(service, json!({})).await;
            assert!(matches!(result, Err(HaError::InvalidServiceName(_))), "{service}");
        }
    }

    #[tokio::test]
    async fn test_call_service_auth_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/services/select/select_option")
            .with_status(401)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "bad").unwrap();
        let result = client.call_service("select.select_option", json!({})).await;
        assert!(matches!(result, Err(HaError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_ping() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        assert!(client.ping().await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_unreachable_is_false() {
        let client = HomeAssistantClient::new("http://127.0.0.1:9", "token")
            .unwrap()
            .with_retry_config(1, Duration::from_millis(1));
        assert!(!client.ping().await.unwrap());
    }

    #[test]
    fn test_configured_values_take_priority() {
        let client = HomeAssistantClient::from_config(
            Some("http://ha.local:8123/".to_owned()),
            Some("configured".to_owned()),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://ha.local:8123");
        assert_eq!(client.token, "configured");
    }
}
