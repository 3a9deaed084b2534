use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use tracing::warn;

use super::{write_file, StateError, StateStore};

fn alert_key(alert_type: &str, identifier: &str) -> String {
    format!("{}:{}", alert_type, identifier)
}

impl StateStore {
    /// Raw history, `"{type}:{id}" -> JSON value`. Entries are decoded one at a
    /// time so a single bad timestamp only affects its own key.
    fn alert_history(&self) -> BTreeMap<String, serde_json::Value> {
        let path = self.alert_history_path();
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring corrupt alert history {}: {}", path.display(), e);
            BTreeMap::new()
        })
    }

    pub fn last_alert_sent(&self, alert_type: &str, identifier: &str) -> Option<DateTime<Utc>> {
        let history = self.alert_history();
        let value = history.get(&alert_key(alert_type, identifier))?;
        let raw = value.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
    }

    /// Whether an alert may go out at `now` given its cooldown
    pub fn should_send_alert_at(
        &self,
        alert_type: &str,
        identifier: &str,
        cooldown_minutes: u32,
        now: DateTime<Utc>,
    ) -> bool {
        match self.last_alert_sent(alert_type, identifier) {
            Some(last) => now - last >= Duration::minutes(i64::from(cooldown_minutes)),
            None => true,
        }
    }

    pub fn should_send_alert(&self, alert_type: &str, identifier: &str, cooldown_minutes: u32) -> bool {
        self.should_send_alert_at(alert_type, identifier, cooldown_minutes, Utc::now())
    }

    pub fn record_alert_sent_at(
        &self,
        alert_type: &str,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let path = self.alert_history_path();
        let mut history = self.alert_history();
        history.insert(
            alert_key(alert_type, identifier),
            serde_json::Value::String(now.to_rfc3339()),
        );
        let encoded = serde_json::to_vec_pretty(&history)?;
        write_file(&path, &encoded)
    }

    pub fn record_alert_sent(&self, alert_type: &str, identifier: &str) -> Result<(), StateError> {
        self.record_alert_sent_at(alert_type, identifier, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::store::{ALERT_DIR, ALERT_HISTORY_FILE};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_cooldown_window() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());

        assert!(store.should_send_alert_at("pipe_freeze", "Crawlspace", 60, t0()));
        store
            .record_alert_sent_at("pipe_freeze", "Crawlspace", t0())
            .unwrap();
        assert!(!store.should_send_alert_at("pipe_freeze", "Crawlspace", 60, t0()));
        assert!(!store.should_send_alert_at(
            "pipe_freeze",
            "Crawlspace",
            60,
            t0() + Duration::minutes(59)
        ));
        assert!(store.should_send_alert_at(
            "pipe_freeze",
            "Crawlspace",
            60,
            t0() + Duration::minutes(60)
        ));
    }

    #[test]
    fn test_keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());

        store
            .record_alert_sent_at("pipe_freeze", "Crawlspace", t0())
            .unwrap();
        assert!(store.should_send_alert_at("pipe_freeze", "Garage", 60, t0()));
        assert!(store.should_send_alert_at("low_battery", "Crawlspace", 60, t0()));
    }

    #[test]
    fn test_corrupt_entry_is_eligible() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(ALERT_DIR)).unwrap();
        std::fs::write(
            dir.path().join(ALERT_DIR).join(ALERT_HISTORY_FILE),
            r#"{"pipe_freeze:Crawlspace": "yesterday-ish", "pipe_freeze:Garage": "2026-01-10T03:00:00+00:00"}"#,
        )
        .unwrap();
        let store = StateStore::new(dir.path());

        assert!(store.should_send_alert_at("pipe_freeze", "Crawlspace", 60, t0()));
        assert!(!store.should_send_alert_at("pipe_freeze", "Garage", 60, t0()));
    }

    #[test]
    fn test_corrupt_file_is_eligible() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(ALERT_DIR)).unwrap();
        std::fs::write(dir.path().join(ALERT_DIR).join(ALERT_HISTORY_FILE), "[[[").unwrap();
        let store = StateStore::new(dir.path());

        assert!(store.should_send_alert_at("pipe_freeze", "Crawlspace", 60, t0()));
        store
            .record_alert_sent_at("pipe_freeze", "Crawlspace", t0())
            .unwrap();
        assert!(!store.should_send_alert_at("pipe_freeze", "Crawlspace", 60, t0()));
    }
}
