use std::time::Instant;

use serde::Serialize;
use strum::Display;
use strum::EnumString;

use crate::devices::DeviceError;

/// The four house-wide transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Wake,
    Sleep,
    Away,
    Home,
}

impl TransitionKind {
    fn title(self) -> &'static str {
        match self {
            TransitionKind::Wake => "Good Morning",
            TransitionKind::Sleep => "Good Night",
            TransitionKind::Away => "Away Mode",
            TransitionKind::Home => "Welcome Home",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransitionStatus {
    Success,
    Partial,
    Failed,
}

impl TransitionStatus {
    fn from_counts(succeeded: usize, failed: usize) -> Self {
        if succeeded == 0 {
            TransitionStatus::Failed
        } else if failed == 0 {
            TransitionStatus::Success
        } else {
            TransitionStatus::Partial
        }
    }
}

/// Outcome of one transition invocation. Built fresh every call, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionResult {
    pub transition: TransitionKind,
    pub status: TransitionStatus,
    pub actions: Vec<String>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl TransitionResult {
    pub fn notification_title(&self) -> String {
        if self.errors.is_empty() {
            self.transition.title().to_string()
        } else {
            format!("{} (with errors)", self.transition.title())
        }
    }
}

/// Accumulates per-device outcomes while a transition runs
pub(super) struct TransitionRun {
    kind: TransitionKind,
    started: Instant,
    actions: Vec<String>,
    errors: Vec<String>,
    succeeded: usize,
}

impl TransitionRun {
    pub(super) fn start(kind: TransitionKind) -> Self {
        Self {
            kind,
            started: Instant::now(),
            actions: Vec::new(),
            errors: Vec::new(),
            succeeded: 0,
        }
    }

    pub(super) fn succeeded(&mut self, action: String) {
        self.actions.push(action);
        self.succeeded += 1;
    }

    /// `role` names the slot in the notification ("Outlets"), `device` the
    /// vendor in the error list ("Tapo").
    pub(super) fn failed(&mut self, role: &str, device: &str, error: &DeviceError) {
        self.actions.push(format!("✗ {} failed", role));
        self.errors.push(format!("{}: {}", device, error.kind()));
    }

    pub(super) fn finish(self) -> TransitionResult {
        TransitionResult {
            transition: self.kind,
            status: TransitionStatus::from_counts(self.succeeded, self.errors.len()),
            actions: self.actions,
            errors: self.errors,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rules() {
        assert_eq!(TransitionStatus::from_counts(3, 0), TransitionStatus::Success);
        assert_eq!(TransitionStatus::from_counts(2, 1), TransitionStatus::Partial);
        assert_eq!(TransitionStatus::from_counts(0, 3), TransitionStatus::Failed);
        assert_eq!(TransitionStatus::from_counts(0, 0), TransitionStatus::Failed);
    }

    #[test]
    fn test_run_records_failures_in_order() {
        let mut run = TransitionRun::start(TransitionKind::Sleep);
        run.succeeded("Nest → ECO (sleep)".to_string());
        run.failed("AC", "Sensibo", &DeviceError::Timeout);
        run.succeeded("Tapo → all off".to_string());

        let result = run.finish();
        assert_eq!(result.status, TransitionStatus::Partial);
        assert_eq!(
            result.actions,
            vec!["Nest → ECO (sleep)", "✗ AC failed", "Tapo → all off"]
        );
        assert_eq!(result.errors, vec!["Sensibo: TimeoutError"]);
    }

    #[test]
    fn test_titles() {
        let mut run = TransitionRun::start(TransitionKind::Wake);
        run.succeeded("Nest → 70°F HEAT".to_string());
        assert_eq!(run.finish().notification_title(), "Good Morning");

        let mut run = TransitionRun::start(TransitionKind::Away);
        run.failed("Thermostat", "Nest", &DeviceError::Timeout);
        assert_eq!(run.finish().notification_title(), "Away Mode (with errors)");
    }

    #[test]
    fn test_serialized_shape() {
        let result = TransitionResult {
            transition: TransitionKind::Home,
            status: TransitionStatus::Partial,
            actions: vec!["Nest → 70°F HEAT".to_string(), "✗ AC failed".to_string()],
            errors: vec!["Sensibo: ConnectionError".to_string()],
            duration_ms: 12,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "transition": "home",
                "status": "partial",
                "actions": ["Nest → 70°F HEAT", "✗ AC failed"],
                "errors": ["Sensibo: ConnectionError"],
                "duration_ms": 12
            })
        );
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("wake".parse::<TransitionKind>().unwrap(), TransitionKind::Wake);
        assert!("nap".parse::<TransitionKind>().is_err());
    }
}
