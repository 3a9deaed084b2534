//! Hand-written fakes for the device, weather and notification traits.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use hearthctl::devices::{Climate, DeviceError, DeviceStatus, Outlets};
use hearthctl::engine::{Devices, EngineSettings, TransitionEngine};
use hearthctl::hvac::HvacMode;
use hearthctl::notify::{Notifier, NotifyError, Priority};
use hearthctl::weather::{WeatherError, WeatherSource, WeatherState};
use hearthctl::StateStore;
use tempfile::TempDir;

/// Every device call, in order, across all fakes sharing the log
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn timeout() -> DeviceError {
    DeviceError::Timeout
}

pub fn refused() -> DeviceError {
    DeviceError::Connection("connection refused".to_string())
}

pub struct MockClimate {
    pub name: &'static str,
    pub fail_with: Option<fn() -> DeviceError>,
    pub indoor_f: Option<f64>,
    pub log: CallLog,
}

impl MockClimate {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            fail_with: None,
            indoor_f: None,
            log: log.clone(),
        }
    }

    fn outcome(&self) -> Result<(), DeviceError> {
        match self.fail_with {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Climate for MockClimate {
    fn name(&self) -> &str {
        self.name
    }

    async fn get_status(&self) -> Result<DeviceStatus, DeviceError> {
        self.outcome()?;
        Ok(DeviceStatus {
            current_temp_f: self.indoor_f,
            ..Default::default()
        })
    }

    async fn set_comfort_mode(
        &self,
        temp_f: Option<f64>,
        hvac_mode: Option<HvacMode>,
    ) -> Result<(), DeviceError> {
        let mode = hvac_mode.map(|m| format!(" {}", m)).unwrap_or_default();
        self.log
            .push(format!("{} comfort {:?}{}", self.name, temp_f, mode));
        self.outcome()
    }

    async fn set_away_mode(&self) -> Result<(), DeviceError> {
        self.log.push(format!("{} away", self.name));
        self.outcome()
    }

    async fn set_sleep_mode(&self, temp_f: Option<f64>) -> Result<(), DeviceError> {
        self.log.push(format!("{} sleep {:?}", self.name, temp_f));
        self.outcome()
    }
}

pub struct MockOutlets {
    pub fail_with: Option<fn() -> DeviceError>,
    pub log: CallLog,
}

#[async_trait]
impl Outlets for MockOutlets {
    fn name(&self) -> &str {
        "Tapo"
    }

    async fn get_status(&self) -> Result<DeviceStatus, DeviceError> {
        Ok(DeviceStatus::default())
    }

    async fn turn_off_all(&self) -> Result<(), DeviceError> {
        self.log.push("Tapo off".to_string());
        match self.fail_with {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

/// `None` behaves like an unreachable weather service
pub struct FixedWeather(pub Option<f64>);

#[async_trait]
impl WeatherSource for FixedWeather {
    async fn current_weather(&self) -> Result<WeatherState, WeatherError> {
        match self.0 {
            Some(t) => Ok(WeatherState {
                temperature_f: t,
                condition: "Clear sky".to_string(),
                humidity: None,
            }),
            None => Err(WeatherError::NotConfigured),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub title: String,
    pub lines: Vec<String>,
    pub priority: Priority,
}

impl Sent {
    /// Title and body the way a phone would show them
    pub fn render(&self) -> String {
        format!("{}\n{}", self.title, self.lines.join("\n"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
    pub reject: bool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_summary(
        &self,
        title: &str,
        lines: &[String],
        priority: Priority,
    ) -> Result<(), NotifyError> {
        if self.reject {
            return Err(NotifyError::Rejected("application token is invalid".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            title: title.to_string(),
            lines: lines.to_vec(),
            priority,
        });
        Ok(())
    }
}

/// Knobs for one test house
#[derive(Default)]
pub struct HouseSpec {
    pub thermostat_fails: Option<fn() -> DeviceError>,
    pub ac_fails: Option<fn() -> DeviceError>,
    pub outlets_fail: Option<fn() -> DeviceError>,
    pub indoor_f: Option<f64>,
    pub outdoor_f: Option<f64>,
    pub notifier_rejects: bool,
    pub dry_run: bool,
}

/// An engine wired to fakes, with its state directory
pub struct House {
    pub engine: TransitionEngine,
    pub log: CallLog,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

impl House {
    pub fn new(spec: HouseSpec) -> Self {
        let dir = TempDir::new().unwrap();
        let log = CallLog::default();

        let mut thermostat = MockClimate::new("Nest", &log);
        thermostat.fail_with = spec.thermostat_fails;
        thermostat.indoor_f = spec.indoor_f;
        let mut ac = MockClimate::new("Sensibo", &log);
        ac.fail_with = spec.ac_fails;
        let outlets = MockOutlets {
            fail_with: spec.outlets_fail,
            log: log.clone(),
        };

        let notifier = Arc::new(RecordingNotifier {
            reject: spec.notifier_rejects,
            ..Default::default()
        });

        let engine = TransitionEngine::new(
            Devices {
                thermostat: Arc::new(thermostat),
                ac: Arc::new(ac),
                outlets: Arc::new(outlets),
            },
            Arc::new(FixedWeather(spec.outdoor_f)),
            notifier.clone(),
            StateStore::new(dir.path()),
            EngineSettings::default(),
            spec.dry_run,
        );

        Self {
            engine,
            log,
            notifier,
            dir,
        }
    }

    pub fn healthy() -> Self {
        Self::new(HouseSpec::default())
    }

    pub fn store(&self) -> &StateStore {
        self.engine.store()
    }
}
