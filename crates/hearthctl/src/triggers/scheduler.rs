use chrono::Duration;
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::config::ScheduleConfig;
use crate::engine::{TransitionEngine, TransitionKind, TransitionResult, TransitionStatus};

const MINUTES_PER_DAY: u32 = 24 * 60;

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Minutes since the most recent `at`, across midnight
fn minutes_since(now: NaiveTime, at: NaiveTime) -> u32 {
    (minute_of_day(now) + MINUTES_PER_DAY - minute_of_day(at)) % MINUTES_PER_DAY
}

/// Whether `now` is within `window` minutes after `at`, across midnight
fn in_window(now: NaiveTime, at: NaiveTime, window: u32) -> bool {
    minutes_since(now, at) < window
}

/// The date a window that is open at `now` opened on. A 23:55 window still
/// open at 00:05 belongs to the previous day.
fn window_date(now: NaiveDateTime, at: NaiveTime) -> NaiveDate {
    (now - Duration::minutes(i64::from(minutes_since(now.time(), at)))).date()
}

/// One scheduler pass at the local wall clock
pub async fn scheduler_tick(
    engine: &TransitionEngine,
    schedule: &ScheduleConfig,
) -> Vec<TransitionResult> {
    scheduler_tick_at(engine, schedule, Local::now().naive_local()).await
}

/// Fire wake/sleep if `now` falls in their window and they haven't completed
/// for the day that window opened on. A failed or dry-run transition is not
/// recorded, so the next tick inside the window tries again.
pub async fn scheduler_tick_at(
    engine: &TransitionEngine,
    schedule: &ScheduleConfig,
    now: NaiveDateTime,
) -> Vec<TransitionResult> {
    let store = engine.store();
    let mut results = Vec::new();

    for (kind, at) in [
        (TransitionKind::Wake, schedule.wake_time),
        (TransitionKind::Sleep, schedule.sleep_time),
    ] {
        if !in_window(now.time(), at, schedule.window_minutes) {
            continue;
        }
        let day = window_date(now, at);
        if store.already_ran_on(kind, day) {
            debug!("{} already ran on {}, skipping", kind, day);
            continue;
        }

        info!("Scheduled {} is due ({})", kind, at.format("%H:%M"));
        let result = engine.run(kind).await;

        if result.status == TransitionStatus::Failed {
            info!("{} failed, leaving it unrecorded for the next tick", kind);
        } else if engine.dry_run() {
            info!("Dry run: would record {} as done for {}", kind, day);
        } else if let Err(e) = store.mark_completed_on(kind, day) {
            error!("Failed to record {} completion: {}", kind, e);
        }

        results.push(result);
    }

    results
}
