//! JSON-over-HTTP bridge adapter.
//!
//! Each device sits behind a small bridge service exposing
//! `GET {url}/status` and `POST {url}/mode`. The bridge owns the vendor API
//! and its idempotency; this side only shapes requests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::{Climate, DeviceError, DeviceStatus, Outlets};
use crate::config::DeviceConfig;
use crate::hvac::HvacMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ModeName {
    Comfort,
    Away,
    Sleep,
    Off,
}

#[derive(Debug, Serialize)]
struct ModeRequest {
    mode: ModeName,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hvac_mode: Option<HvacMode>,
}

#[derive(Debug, Deserialize)]
struct ModeResponse {
    ok: Option<bool>,
    error: Option<String>,
}

/// Shared HTTP plumbing for one bridged device
pub struct HttpBridge {
    client: reqwest::Client,
    name: String,
    base_url: Option<String>,
    dry_run: bool,
}

impl HttpBridge {
    pub fn new(config: &DeviceConfig, dry_run: bool) -> Result<Self, DeviceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            name: config.name.clone(),
            base_url: config
                .url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            dry_run,
        })
    }

    fn url(&self, path: &str) -> Result<String, DeviceError> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/{}", base, path))
            .ok_or(DeviceError::NotConfigured)
    }

    async fn status(&self) -> Result<DeviceStatus, DeviceError> {
        if self.dry_run {
            info!("[{}] dry run: would fetch status", self.name);
            return Ok(DeviceStatus::default());
        }

        let status = self
            .client
            .get(self.url("status")?)
            .send()
            .await?
            .error_for_status()?
            .json::<DeviceStatus>()
            .await?;
        debug!("[{}] status: {:?}", self.name, status);
        Ok(status)
    }

    async fn send_mode(&self, request: ModeRequest) -> Result<(), DeviceError> {
        if self.dry_run {
            info!("[{}] dry run: would set {:?}", self.name, request);
            return Ok(());
        }

        let url = self.url("mode")?;
        debug!("[{}] POST {} {:?}", self.name, url, request);
        let body = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if body.trim().is_empty() {
            return Ok(());
        }
        let response: ModeResponse =
            serde_json::from_str(&body).map_err(|e| DeviceError::Decode(e.to_string()))?;
        if response.ok == Some(false) {
            return Err(DeviceError::Api(
                response.error.unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }

        info!("[{}] set {:?}", self.name, request.mode);
        Ok(())
    }
}

/// Thermostat or AC controller reached through an [`HttpBridge`]
pub struct HttpClimate {
    bridge: HttpBridge,
}

impl HttpClimate {
    pub fn new(config: &DeviceConfig, dry_run: bool) -> Result<Self, DeviceError> {
        Ok(Self {
            bridge: HttpBridge::new(config, dry_run)?,
        })
    }
}

#[async_trait]
impl Climate for HttpClimate {
    fn name(&self) -> &str {
        &self.bridge.name
    }

    async fn get_status(&self) -> Result<DeviceStatus, DeviceError> {
        self.bridge.status().await
    }

    async fn set_comfort_mode(
        &self,
        temp_f: Option<f64>,
        hvac_mode: Option<HvacMode>,
    ) -> Result<(), DeviceError> {
        self.bridge
            .send_mode(ModeRequest {
                mode: ModeName::Comfort,
                temp_f,
                hvac_mode,
            })
            .await
    }

    async fn set_away_mode(&self) -> Result<(), DeviceError> {
        self.bridge
            .send_mode(ModeRequest {
                mode: ModeName::Away,
                temp_f: None,
                hvac_mode: None,
            })
            .await
    }

    async fn set_sleep_mode(&self, temp_f: Option<f64>) -> Result<(), DeviceError> {
        self.bridge
            .send_mode(ModeRequest {
                mode: ModeName::Sleep,
                temp_f,
                hvac_mode: None,
            })
            .await
    }
}

/// Outlet bank reached through an [`HttpBridge`]
pub struct HttpOutlets {
    bridge: HttpBridge,
}

impl HttpOutlets {
    pub fn new(config: &DeviceConfig, dry_run: bool) -> Result<Self, DeviceError> {
        Ok(Self {
            bridge: HttpBridge::new(config, dry_run)?,
        })
    }
}

#[async_trait]
impl Outlets for HttpOutlets {
    fn name(&self) -> &str {
        &self.bridge.name
    }

    async fn get_status(&self) -> Result<DeviceStatus, DeviceError> {
        self.bridge.status().await
    }

    async fn turn_off_all(&self) -> Result<(), DeviceError> {
        self.bridge
            .send_mode(ModeRequest {
                mode: ModeName::Off,
                temp_f: None,
                hvac_mode: None,
            })
            .await
    }
}
