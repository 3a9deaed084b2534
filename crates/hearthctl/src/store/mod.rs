//! Plain-file state shared between independently launched processes.
//!
//! Every call opens, reads or writes, and closes its file. Nothing is cached
//! and nothing is locked: concurrent writers race and the last write wins.
//! Reads never fail; a missing or unreadable file maps to a safe default.

mod alerts;
mod night;
mod presence;
mod scheduler;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use presence::Presence;
pub use scheduler::SchedulerRecord;

pub const PRESENCE_FILE: &str = ".presence_state";
pub const NIGHT_MODE_FILE: &str = ".night_mode";
pub const SCHEDULER_FILE: &str = ".scheduler_state";
pub const ALERT_DIR: &str = ".alert_state";
pub const ALERT_HISTORY_FILE: &str = "alert_history.json";

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handle on the marker files under one root directory
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

/// Everything in the store at one moment, for status output
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub presence: Presence,
    pub night_mode: bool,
    pub scheduler: SchedulerRecord,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn alert_history_path(&self) -> PathBuf {
        self.root.join(ALERT_DIR).join(ALERT_HISTORY_FILE)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            presence: self.read_presence(),
            night_mode: self.is_night_mode(),
            scheduler: self.scheduler_record(),
        }
    }
}

/// Write a state file, creating the state directory on first use
fn write_file(path: &Path, contents: &[u8]) -> Result<(), StateError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| StateError::Io {
        path: path.to_path_buf(),
        source,
    })
}
