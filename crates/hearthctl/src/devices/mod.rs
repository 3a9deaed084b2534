//! Device capability facade.
//!
//! The transition engine only ever talks to these traits. Vendor specifics
//! live behind them; the engine treats every error the same way and records
//! [`DeviceError::kind`].

mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

pub use http::{HttpBridge, HttpClimate, HttpOutlets};

use crate::hvac::HvacMode;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("device returned HTTP {status}")]
    Http { status: u16 },

    #[error("device rejected request: {0}")]
    Api(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("device is not configured")]
    NotConfigured,
}

impl DeviceError {
    /// Short error class name recorded in transition results
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::Timeout => "TimeoutError",
            DeviceError::Connection(_) => "ConnectionError",
            DeviceError::Http { .. } => "HttpError",
            DeviceError::Api(_) => "ApiError",
            DeviceError::Decode(_) => "DecodeError",
            DeviceError::NotConfigured => "NotConfiguredError",
        }
    }
}

impl From<reqwest::Error> for DeviceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeviceError::Timeout
        } else if e.is_connect() {
            DeviceError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            DeviceError::Http {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            DeviceError::Decode(e.to_string())
        } else {
            DeviceError::Api(e.to_string())
        }
    }
}

/// Device-reported state. Fields a device doesn't have stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_temp_f: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,

    /// Anything else the device reports
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A heating/cooling device: the thermostat or the AC controller.
///
/// Every setter is idempotent; asking for the mode a device is already in is a
/// no-op on the device side.
#[async_trait]
pub trait Climate: Send + Sync {
    /// Vendor label, e.g. "Nest"
    fn name(&self) -> &str;

    async fn get_status(&self) -> Result<DeviceStatus, DeviceError>;

    /// Occupied comfort setting. `temp_f = None` keeps the device's own target.
    async fn set_comfort_mode(
        &self,
        temp_f: Option<f64>,
        hvac_mode: Option<HvacMode>,
    ) -> Result<(), DeviceError>;

    async fn set_away_mode(&self) -> Result<(), DeviceError>;

    /// Night setting. A thermostat without a sleep preset maps this to its
    /// eco/away preset.
    async fn set_sleep_mode(&self, temp_f: Option<f64>) -> Result<(), DeviceError>;
}

/// A bank of smart outlets that can be switched off together
#[async_trait]
pub trait Outlets: Send + Sync {
    fn name(&self) -> &str;

    async fn get_status(&self) -> Result<DeviceStatus, DeviceError>;

    async fn turn_off_all(&self) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DeviceError::Timeout.kind(), "TimeoutError");
        assert_eq!(
            DeviceError::Connection("refused".to_string()).kind(),
            "ConnectionError"
        );
        assert_eq!(DeviceError::Http { status: 503 }.kind(), "HttpError");
    }

    #[test]
    fn test_status_keeps_extra_fields() {
        let status: DeviceStatus = serde_json::from_str(
            r#"{"current_temp_f": 68.5, "mode": "HEAT", "humidity": 41, "eco": false}"#,
        )
        .unwrap();

        assert_eq!(status.current_temp_f, Some(68.5));
        assert_eq!(status.mode.as_deref(), Some("HEAT"));
        assert_eq!(status.on, None);
        assert_eq!(status.extra["humidity"], 41);
        assert_eq!(status.extra["eco"], false);
    }
}
