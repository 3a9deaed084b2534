use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveTime;
use serde::Deserialize;
use toml::Spanned;
use tracing_subscriber::filter::LevelFilter;

use super::diagnostics::{
    format_diagnostics, Diagnostic, Error, FieldOrigin, LoadError, ValidationError, Warning,
};
use super::partial::{PartialConfig, PartialDeviceConfig};

pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com";

#[derive(Debug, Default, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub schedule: ScheduleConfig,
    pub hvac: HvacConfig,
    pub comfort: ComfortConfig,
    pub state: StateConfig,
    pub automations: AutomationsConfig,
    pub alerts: AlertsConfig,
    pub api: ApiConfig,
    pub weather: WeatherConfig,
    pub notify: NotifyConfig,
    pub devices: DevicesConfig,
}

// LogLevel needs Deserialize because it's used in PartialLoggingConfig with toml::Spanned
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"hearthctl::devices" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

/// Daily wake/sleep times in local wall-clock time
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub wake_time: NaiveTime,
    pub sleep_time: NaiveTime,

    /// How long after a scheduled time the scheduler tick still fires it
    pub window_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            wake_time: hhmm(5, 0),
            sleep_time: hhmm(22, 30),
            window_minutes: 15,
        }
    }
}

/// Outdoor thresholds for seasonal HVAC mode selection
#[derive(Debug, Clone, PartialEq)]
pub struct HvacConfig {
    pub heat_below: f64,
    pub cool_above: f64,

    /// Indoor/target gap (°F) beyond which indoor temperature decides the mode
    pub override_delta: f64,

    /// Outdoor temperature assumed when the weather lookup fails
    pub fallback_outdoor_f: f64,
}

impl Default for HvacConfig {
    fn default() -> Self {
        Self {
            heat_below: 65.0,
            cool_above: 75.0,
            override_delta: 2.0,
            fallback_outdoor_f: 70.0,
        }
    }
}

/// Target temperatures used by the transitions
#[derive(Debug, Clone, PartialEq)]
pub struct ComfortConfig {
    pub default_f: f64,
    pub cold_outdoor_below: f64,
    pub cold_target_f: f64,
    pub hot_outdoor_above: f64,
    pub hot_target_f: f64,
    pub ac_sleep_f: f64,
}

impl Default for ComfortConfig {
    fn default() -> Self {
        Self {
            default_f: 70.0,
            cold_outdoor_below: 40.0,
            cold_target_f: 72.0,
            hot_outdoor_above: 75.0,
            hot_target_f: 68.0,
            ac_sleep_f: 66.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Directory holding the marker files
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct AutomationsConfig {
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertsConfig {
    pub cooldown_minutes: u32,
    pub freeze_below_f: f64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 60,
            freeze_below_f: 38.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen: String,
    pub port: u16,

    /// Bearer token required on every request when set
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".to_string(),
            port: 8565,
            token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            base_url: DEFAULT_WEATHER_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Pushover credentials; without both, notifications only go to the log
#[derive(Debug, Default, Clone)]
pub struct NotifyConfig {
    pub token: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DevicesConfig {
    pub thermostat: DeviceConfig,
    pub ac: DeviceConfig,
    pub outlets: DeviceConfig,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            thermostat: DeviceConfig::named("Nest"),
            ac: DeviceConfig::named("Sensibo"),
            outlets: DeviceConfig::named("Tapo"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Vendor label used in notifications and error entries
    pub name: String,

    /// Base URL of the HTTP bridge for this device
    pub url: Option<String>,

    pub timeout_secs: u64,
}

impl DeviceConfig {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{0}")]
    Invalid(String),
}

fn hhmm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn value<T: Clone>(field: &Option<Spanned<T>>) -> Option<T> {
    field.as_ref().map(|s| s.get_ref().clone())
}

/// Collects validation failures against the merged config
struct Validator<'a> {
    origins: &'a HashMap<String, FieldOrigin>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Validator<'_> {
    fn error(&mut self, field_path: &str, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::Error(Error::Validation(ValidationError {
                field_path: field_path.to_string(),
                message: message.into(),
                origin: self.origins.get(field_path).cloned(),
            })));
    }

    fn time(&mut self, field_path: &str, field: &Option<Spanned<String>>, default: NaiveTime) -> NaiveTime {
        let Some(raw) = value(field) else {
            return default;
        };
        match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
            Ok(time) => time,
            Err(_) => {
                self.error(field_path, format!("expected HH:MM, found '{}'", raw));
                default
            }
        }
    }
}

impl Config {
    /// Load configuration from one or more TOML files with import resolution.
    ///
    /// Returns the config along with any warnings. Fails with every merge and
    /// validation error rendered together when at least one error exists.
    pub fn from_files(paths: &[PathBuf]) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let configs = PartialConfig::load_with_imports(paths)?;
        let (partial, diagnostics) = PartialConfig::merge(configs);
        Self::from_partial(partial, diagnostics)
    }

    /// Convert a merged PartialConfig into a Config, validating every field
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let mut v = Validator {
            origins: &partial.origins,
            diagnostics: &mut diagnostics,
        };

        let logging = partial
            .logging
            .map(|l| LoggingConfig {
                level: value(&l.level).unwrap_or_default(),
                overrides: l
                    .overrides
                    .map(|hm| {
                        hm.into_iter()
                            .map(|(target, level)| (target, level.into_inner()))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let defaults = ScheduleConfig::default();
        let schedule = match &partial.schedule {
            Some(s) => ScheduleConfig {
                wake_time: v.time("schedule.wake_time", &s.wake_time, defaults.wake_time),
                sleep_time: v.time("schedule.sleep_time", &s.sleep_time, defaults.sleep_time),
                window_minutes: value(&s.window_minutes).unwrap_or(defaults.window_minutes),
            },
            None => defaults,
        };
        if schedule.window_minutes == 0 {
            v.error("schedule.window_minutes", "must be at least 1 minute");
        }

        let defaults = HvacConfig::default();
        let hvac = match &partial.hvac {
            Some(h) => HvacConfig {
                heat_below: value(&h.heat_below).unwrap_or(defaults.heat_below),
                cool_above: value(&h.cool_above).unwrap_or(defaults.cool_above),
                override_delta: value(&h.override_delta).unwrap_or(defaults.override_delta),
                fallback_outdoor_f: value(&h.fallback_outdoor_f)
                    .unwrap_or(defaults.fallback_outdoor_f),
            },
            None => defaults,
        };
        if hvac.heat_below > hvac.cool_above {
            v.error(
                "hvac.heat_below",
                format!(
                    "heat_below ({}) must not exceed cool_above ({})",
                    hvac.heat_below, hvac.cool_above
                ),
            );
        }
        if hvac.override_delta < 0.0 {
            v.error("hvac.override_delta", "must not be negative");
        }

        let defaults = ComfortConfig::default();
        let comfort = match &partial.comfort {
            Some(c) => ComfortConfig {
                default_f: value(&c.default_f).unwrap_or(defaults.default_f),
                cold_outdoor_below: value(&c.cold_outdoor_below)
                    .unwrap_or(defaults.cold_outdoor_below),
                cold_target_f: value(&c.cold_target_f).unwrap_or(defaults.cold_target_f),
                hot_outdoor_above: value(&c.hot_outdoor_above)
                    .unwrap_or(defaults.hot_outdoor_above),
                hot_target_f: value(&c.hot_target_f).unwrap_or(defaults.hot_target_f),
                ac_sleep_f: value(&c.ac_sleep_f).unwrap_or(defaults.ac_sleep_f),
            },
            None => defaults,
        };
        if comfort.cold_outdoor_below > comfort.hot_outdoor_above {
            v.error(
                "comfort.cold_outdoor_below",
                "cold band must sit below the hot band",
            );
        }

        let state = StateConfig {
            dir: partial
                .state
                .as_ref()
                .and_then(|s| value(&s.dir))
                .unwrap_or_else(|| StateConfig::default().dir),
        };

        let automations = AutomationsConfig {
            dry_run: partial
                .automations
                .as_ref()
                .and_then(|a| value(&a.dry_run))
                .unwrap_or(false),
        };

        let defaults = AlertsConfig::default();
        let alerts = match &partial.alerts {
            Some(a) => AlertsConfig {
                cooldown_minutes: value(&a.cooldown_minutes).unwrap_or(defaults.cooldown_minutes),
                freeze_below_f: value(&a.freeze_below_f).unwrap_or(defaults.freeze_below_f),
            },
            None => defaults,
        };

        let defaults = ApiConfig::default();
        let api = match &partial.api {
            Some(a) => ApiConfig {
                listen: value(&a.listen).unwrap_or(defaults.listen),
                port: value(&a.port).unwrap_or(defaults.port),
                token: value(&a.token),
            },
            None => defaults,
        };

        let defaults = WeatherConfig::default();
        let weather = match &partial.weather {
            Some(w) => WeatherConfig {
                latitude: value(&w.latitude),
                longitude: value(&w.longitude),
                base_url: value(&w.base_url).unwrap_or(defaults.base_url),
                timeout_secs: value(&w.timeout_secs).unwrap_or(defaults.timeout_secs),
            },
            None => defaults,
        };
        if let Some(lat) = weather.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                v.error("weather.latitude", "latitude must be within -90..=90");
            }
        }
        if let Some(lon) = weather.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                v.error("weather.longitude", "longitude must be within -180..=180");
            }
        }
        match (weather.latitude, weather.longitude) {
            (Some(_), None) => v.error("weather.longitude", "longitude is required with latitude"),
            (None, Some(_)) => v.error("weather.latitude", "latitude is required with longitude"),
            (None, None) => v
                .diagnostics
                .push(Diagnostic::Warning(Warning::MissingWeatherLocation)),
            (Some(_), Some(_)) => {}
        }

        let notify = NotifyConfig {
            token: partial.notify.as_ref().and_then(|n| value(&n.token)),
            user: partial.notify.as_ref().and_then(|n| value(&n.user)),
        };
        if notify.token.is_some() != notify.user.is_some() {
            v.error("notify", "token and user must be set together");
        }

        let defaults = DevicesConfig::default();
        let devices = match &partial.devices {
            Some(d) => DevicesConfig {
                thermostat: device(d.thermostat.as_ref(), defaults.thermostat),
                ac: device(d.ac.as_ref(), defaults.ac),
                outlets: device(d.outlets.as_ref(), defaults.outlets),
            },
            None => defaults,
        };

        let config = Config {
            logging,
            schedule,
            hvac,
            comfort,
            state,
            automations,
            alerts,
            api,
            weather,
            notify,
            devices,
        };

        if diagnostics.iter().any(|d| d.is_error()) {
            Err(ConfigError::Invalid(format_diagnostics(&diagnostics)))
        } else {
            Ok((config, diagnostics))
        }
    }
}

fn device(partial: Option<&PartialDeviceConfig>, default: DeviceConfig) -> DeviceConfig {
    let Some(p) = partial else {
        return default;
    };
    DeviceConfig {
        name: value(&p.name).unwrap_or(default.name),
        url: value(&p.url),
        timeout_secs: value(&p.timeout_secs).unwrap_or(default.timeout_secs),
    }
}

/// Decide whether this run is a dry run.
///
/// The CLI flag wins, then the `DRY_RUN` environment variable, then
/// `automations.dry_run` from the config.
pub fn resolve_dry_run(cli_flag: bool, env_value: Option<&str>, config: &AutomationsConfig) -> bool {
    if cli_flag {
        return true;
    }
    if let Some(raw) = env_value {
        return matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    config.dry_run
}
