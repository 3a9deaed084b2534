use std::collections::BTreeMap;

use chrono::Local;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::{write_file, StateError, StateStore, SCHEDULER_FILE};
use crate::engine::TransitionKind;

/// Last local date each scheduled transition completed,
/// stored as `{"last_wake_date": "YYYY-MM-DD", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchedulerRecord(BTreeMap<String, NaiveDate>);

impl SchedulerRecord {
    fn key(kind: TransitionKind) -> String {
        format!("last_{}_date", kind)
    }

    pub fn last_run(&self, kind: TransitionKind) -> Option<NaiveDate> {
        self.0.get(&Self::key(kind)).copied()
    }
}

impl StateStore {
    /// Read the scheduler record. A missing or corrupt file reads as empty so
    /// the scheduler re-runs rather than getting stuck.
    pub fn scheduler_record(&self) -> SchedulerRecord {
        let path = self.path(SCHEDULER_FILE);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return SchedulerRecord::default();
        };
        // Entries decode one at a time so one bad date only loses its own kind
        let entries: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring corrupt scheduler state {}: {}", path.display(), e);
                return SchedulerRecord::default();
            }
        };
        let dates = entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<NaiveDate>(value) {
                Ok(date) => Some((key, date)),
                Err(e) => {
                    warn!("Ignoring bad '{}' in {}: {}", key, path.display(), e);
                    None
                }
            })
            .collect();
        SchedulerRecord(dates)
    }

    pub fn already_ran_on(&self, kind: TransitionKind, date: NaiveDate) -> bool {
        self.scheduler_record().last_run(kind) == Some(date)
    }

    pub fn already_ran_today(&self, kind: TransitionKind) -> bool {
        self.already_ran_on(kind, Local::now().date_naive())
    }

    pub fn mark_completed_on(&self, kind: TransitionKind, date: NaiveDate) -> Result<(), StateError> {
        let mut record = self.scheduler_record();
        record.0.insert(SchedulerRecord::key(kind), date);
        let encoded = serde_json::to_vec_pretty(&record)?;
        write_file(&self.path(SCHEDULER_FILE), &encoded)
    }

    pub fn mark_completed(&self, kind: TransitionKind) -> Result<(), StateError> {
        self.mark_completed_on(kind, Local::now().date_naive())
    }
}
