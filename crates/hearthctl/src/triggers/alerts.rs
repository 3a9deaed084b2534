use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::AlertsConfig;
use crate::notify::{Notifier, Priority};
use crate::store::{StateError, StateStore};

pub const FREEZE_ALERT: &str = "pipe_freeze";

/// Freeze check for one temperature reading. Returns whether an alert went out.
pub async fn check_temperature(
    store: &StateStore,
    notifier: &dyn Notifier,
    config: &AlertsConfig,
    sensor: &str,
    temp_f: f64,
    dry_run: bool,
) -> Result<bool, StateError> {
    check_temperature_at(store, notifier, config, sensor, temp_f, dry_run, Utc::now()).await
}

/// A reading below `freeze_below_f` alerts at most once per cooldown per
/// sensor. A failed send is not recorded, so the next reading retries.
pub async fn check_temperature_at(
    store: &StateStore,
    notifier: &dyn Notifier,
    config: &AlertsConfig,
    sensor: &str,
    temp_f: f64,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<bool, StateError> {
    if temp_f >= config.freeze_below_f {
        debug!("{} at {:.1}°F, above freeze threshold", sensor, temp_f);
        return Ok(false);
    }

    if !store.should_send_alert_at(FREEZE_ALERT, sensor, config.cooldown_minutes, now) {
        debug!("{} freeze alert still cooling down", sensor);
        return Ok(false);
    }

    let title = format!("🥶 Freeze warning: {}", sensor);
    let lines = vec![format!(
        "{} is at {:.0}°F (alert below {:.0}°F)",
        sensor, temp_f, config.freeze_below_f
    )];

    if dry_run {
        info!("Dry run: would send '{}': {:?}", title, lines);
        return Ok(false);
    }

    if let Err(e) = notifier.send_summary(&title, &lines, Priority::High).await {
        warn!("Failed to send freeze alert for {}: {}", sensor, e);
        return Ok(false);
    }

    store.record_alert_sent_at(FREEZE_ALERT, sensor, now)?;
    Ok(true)
}
