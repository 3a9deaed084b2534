mod common;

use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Utc;
use common::{refused, timeout, House, HouseSpec, RecordingNotifier};
use hearthctl::config::{AlertsConfig, ScheduleConfig};
use hearthctl::notify::Priority;
use hearthctl::store::Presence;
use hearthctl::triggers::{self, ArrivalStage, FREEZE_ALERT};
use hearthctl::{StateStore, TransitionKind, TransitionStatus};
use tempfile::TempDir;

fn local(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_tick_runs_wake_once_per_day() {
    let house = House::healthy();
    let schedule = ScheduleConfig::default();

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 5, 3)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].transition, TransitionKind::Wake);
    assert!(house
        .store()
        .already_ran_on(TransitionKind::Wake, local(10, 0, 0).date()));

    // Later in the same window: already done
    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 5, 10)).await;
    assert!(results.is_empty());

    // Next morning it runs again
    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(11, 5, 0)).await;
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_tick_outside_windows_does_nothing() {
    let house = House::healthy();
    let schedule = ScheduleConfig::default();

    for (h, m) in [(4, 59), (5, 15), (12, 0), (22, 29), (22, 45)] {
        let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, h, m)).await;
        assert!(results.is_empty(), "{:02}:{:02}", h, m);
    }
    assert!(house.log.calls().is_empty());
}

#[tokio::test]
async fn test_tick_runs_sleep_in_window() {
    let house = House::healthy();
    let schedule = ScheduleConfig::default();

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 22, 31)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].transition, TransitionKind::Sleep);
    assert!(house.store().is_night_mode());
}

#[tokio::test]
async fn test_sleep_window_across_midnight_fires_once() {
    let house = House::healthy();
    let schedule = ScheduleConfig {
        sleep_time: NaiveTime::from_hms_opt(23, 55, 0).unwrap(),
        ..Default::default()
    };

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 23, 55)).await;
    assert_eq!(results.len(), 1);

    // Same window, now past midnight
    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(11, 0, 5)).await;
    assert!(results.is_empty());
    assert_eq!(
        house.store().scheduler_record().last_run(TransitionKind::Sleep),
        Some(local(10, 0, 0).date())
    );

    // The next night's sleep still runs
    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(11, 23, 55)).await;
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_failed_tick_is_retried() {
    let house = House::new(HouseSpec {
        thermostat_fails: Some(refused),
        ac_fails: Some(timeout),
        ..Default::default()
    });
    let schedule = ScheduleConfig::default();

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 5, 0)).await;
    assert_eq!(results[0].status, TransitionStatus::Failed);
    assert_eq!(house.store().scheduler_record().last_run(TransitionKind::Wake), None);

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 5, 5)).await;
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_partial_tick_is_recorded() {
    let house = House::new(HouseSpec {
        ac_fails: Some(timeout),
        ..Default::default()
    });
    let schedule = ScheduleConfig::default();

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 5, 0)).await;
    assert_eq!(results[0].status, TransitionStatus::Partial);
    assert!(house
        .store()
        .already_ran_on(TransitionKind::Wake, local(10, 0, 0).date()));
}

#[tokio::test]
async fn test_dry_run_tick_is_not_recorded() {
    let house = House::new(HouseSpec {
        dry_run: true,
        ..Default::default()
    });
    let schedule = ScheduleConfig::default();

    let results = triggers::scheduler_tick_at(&house.engine, &schedule, local(10, 5, 0)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(house.store().scheduler_record().last_run(TransitionKind::Wake), None);
}

#[tokio::test]
async fn test_first_presence_report_only_records() {
    let house = House::healthy();
    assert_eq!(house.store().read_presence(), Presence::Unknown);

    let change = triggers::apply_presence(&house.engine, false).await.unwrap();

    assert_eq!(change.previous, Presence::Unknown);
    assert_eq!(change.current, Presence::Away);
    assert!(change.transition.is_none());
    assert_eq!(house.store().read_presence(), Presence::Away);
    assert!(house.log.calls().is_empty());
}

#[tokio::test]
async fn test_presence_changes_run_transitions() {
    let house = House::healthy();
    house.store().write_presence(false).unwrap();

    let change = triggers::apply_presence(&house.engine, true).await.unwrap();
    assert_eq!(
        change.transition.map(|r| r.transition),
        Some(TransitionKind::Home)
    );

    // Same state again is not a change
    let change = triggers::apply_presence(&house.engine, true).await.unwrap();
    assert!(change.transition.is_none());

    let change = triggers::apply_presence(&house.engine, false).await.unwrap();
    assert_eq!(
        change.transition.map(|r| r.transition),
        Some(TransitionKind::Away)
    );
    assert_eq!(house.store().read_presence(), Presence::Away);

    let titles: Vec<String> = house.notifier.sent().into_iter().map(|s| s.title).collect();
    assert_eq!(titles, vec!["Welcome Home", "Away Mode"]);
}

#[tokio::test]
async fn test_dry_run_presence_is_not_written() {
    let house = House::new(HouseSpec {
        dry_run: true,
        ..Default::default()
    });

    triggers::apply_presence(&house.engine, true).await.unwrap();

    assert_eq!(house.store().read_presence(), Presence::Unknown);
}

#[tokio::test]
async fn test_two_stage_arrival() {
    let house = House::healthy();
    house.store().write_presence(false).unwrap();

    let first = triggers::handle_arrival(&house.engine, ArrivalStage::Approaching)
        .await
        .unwrap();
    assert!(!first.already_home);
    assert!(first.transition.is_some());
    // Pre-conditioning is silent
    assert!(house.notifier.sent().is_empty());
    assert_eq!(house.store().read_presence(), Presence::Home);

    let second = triggers::handle_arrival(&house.engine, ArrivalStage::Arrived)
        .await
        .unwrap();
    assert!(second.already_home);
    assert!(second.transition.is_some());
    assert_eq!(house.notifier.sent().len(), 1);
    assert_eq!(house.notifier.sent()[0].title, "Welcome Home");
}

#[tokio::test]
async fn test_approaching_when_already_home_is_a_noop() {
    let house = House::healthy();
    house.store().write_presence(true).unwrap();

    let outcome = triggers::handle_arrival(&house.engine, ArrivalStage::Approaching)
        .await
        .unwrap();

    assert!(outcome.already_home);
    assert!(outcome.transition.is_none());
    assert!(house.log.calls().is_empty());
}

#[tokio::test]
async fn test_arrived_without_approaching_still_notifies() {
    let house = House::healthy();
    house.store().write_presence(false).unwrap();

    let outcome = triggers::handle_arrival(&house.engine, ArrivalStage::Arrived)
        .await
        .unwrap();

    assert!(!outcome.already_home);
    assert_eq!(house.notifier.sent().len(), 1);
    assert_eq!(house.store().read_presence(), Presence::Home);
}

#[tokio::test]
async fn test_freeze_alert_respects_cooldown() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    let notifier = RecordingNotifier::default();
    let config = AlertsConfig::default();
    let t0 = utc("2026-01-10T06:00:00Z");

    let alerted = triggers::check_temperature_at(&store, &notifier, &config, "crawlspace", 33.0, false, t0)
        .await
        .unwrap();
    assert!(alerted);
    assert_eq!(store.last_alert_sent(FREEZE_ALERT, "crawlspace"), Some(t0));

    let sent = notifier.sent();
    assert_eq!(sent[0].priority, Priority::High);
    insta::assert_snapshot!(sent[0].render(), @r"
    🥶 Freeze warning: crawlspace
    crawlspace is at 33°F (alert below 38°F)
    ");

    // Inside the 60 minute cooldown
    let alerted = triggers::check_temperature_at(
        &store,
        &notifier,
        &config,
        "crawlspace",
        31.0,
        false,
        t0 + Duration::minutes(59),
    )
    .await
    .unwrap();
    assert!(!alerted);

    // Another sensor has its own cooldown
    let alerted = triggers::check_temperature_at(
        &store,
        &notifier,
        &config,
        "garage",
        30.0,
        false,
        t0 + Duration::minutes(1),
    )
    .await
    .unwrap();
    assert!(alerted);

    let alerted = triggers::check_temperature_at(
        &store,
        &notifier,
        &config,
        "crawlspace",
        31.0,
        false,
        t0 + Duration::minutes(60),
    )
    .await
    .unwrap();
    assert!(alerted);
    assert_eq!(notifier.sent().len(), 3);
}

#[tokio::test]
async fn test_warm_reading_never_alerts() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    let notifier = RecordingNotifier::default();

    let alerted = triggers::check_temperature(
        &store,
        &notifier,
        &AlertsConfig::default(),
        "crawlspace",
        38.0,
        false,
    )
    .await
    .unwrap();

    assert!(!alerted);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_rejected_alert_is_not_recorded() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    let notifier = RecordingNotifier {
        reject: true,
        ..Default::default()
    };
    let t0 = utc("2026-01-10T06:00:00Z");

    let alerted = triggers::check_temperature_at(
        &store,
        &notifier,
        &AlertsConfig::default(),
        "crawlspace",
        20.0,
        false,
        t0,
    )
    .await
    .unwrap();

    assert!(!alerted);
    assert_eq!(store.last_alert_sent(FREEZE_ALERT, "crawlspace"), None);
}

#[tokio::test]
async fn test_dry_run_alert_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    let notifier = RecordingNotifier::default();

    let alerted = triggers::check_temperature(
        &store,
        &notifier,
        &AlertsConfig::default(),
        "crawlspace",
        20.0,
        true,
    )
    .await
    .unwrap();

    assert!(!alerted);
    assert!(notifier.sent().is_empty());
    assert_eq!(store.last_alert_sent(FREEZE_ALERT, "crawlspace"), None);
}
