//! HVAC mode selection and the nightly sleep window.
//!
//! The seasonal guess comes from the outdoor temperature; a large enough gap
//! between indoor and target temperature overrides it, since immediate comfort
//! matters more than the season.

use chrono::Local;
use chrono::NaiveTime;
use serde::Serialize;
use strum::Display;
use strum::EnumString;
use tracing::debug;
use tracing::warn;

use crate::config::HvacConfig;
use crate::config::ScheduleConfig;
use crate::weather::WeatherSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum HvacMode {
    Heat,
    Cool,
    HeatCool,
}

/// Pure mode decision from known temperatures (°F).
pub fn decide_hvac_mode(
    config: &HvacConfig,
    target_temp_f: f64,
    indoor_temp_f: Option<f64>,
    outdoor_temp_f: f64,
) -> HvacMode {
    if let Some(indoor) = indoor_temp_f {
        if indoor < target_temp_f - config.override_delta {
            return HvacMode::Heat;
        }
        if indoor > target_temp_f + config.override_delta {
            return HvacMode::Cool;
        }
    }

    if outdoor_temp_f < config.heat_below {
        HvacMode::Heat
    } else if outdoor_temp_f > config.cool_above {
        HvacMode::Cool
    } else {
        HvacMode::HeatCool
    }
}

/// Pick an HVAC mode, fetching the outdoor temperature when not supplied.
///
/// Never fails: a weather error falls back to `fallback_outdoor_f`.
pub async fn select_hvac_mode(
    config: &HvacConfig,
    weather: &dyn WeatherSource,
    target_temp_f: f64,
    indoor_temp_f: Option<f64>,
    outdoor_temp_f: Option<f64>,
) -> HvacMode {
    let outdoor = match outdoor_temp_f {
        Some(t) => t,
        None => match weather.current_weather().await {
            Ok(w) => w.temperature_f,
            Err(e) => {
                warn!(
                    "Outdoor temperature unavailable ({}), assuming {}°F",
                    e, config.fallback_outdoor_f
                );
                config.fallback_outdoor_f
            }
        },
    };

    let mode = decide_hvac_mode(config, target_temp_f, indoor_temp_f, outdoor);
    debug!(
        target = target_temp_f,
        indoor = ?indoor_temp_f,
        outdoor,
        %mode,
        "Selected HVAC mode"
    );
    mode
}

/// Whether `now` falls in the half-open window `[sleep_time, wake_time)`,
/// which may wrap past midnight.
pub fn is_sleep_time_at(schedule: &ScheduleConfig, now: NaiveTime) -> bool {
    let (sleep, wake) = (schedule.sleep_time, schedule.wake_time);
    if sleep <= wake {
        now >= sleep && now < wake
    } else {
        now >= sleep || now < wake
    }
}

/// [`is_sleep_time_at`] against the local wall clock
pub fn is_sleep_time(schedule: &ScheduleConfig) -> bool {
    is_sleep_time_at(schedule, Local::now().time())
}
