use std::io::ErrorKind;

use super::{write_file, StateError, StateStore, NIGHT_MODE_FILE};

impl StateStore {
    /// Night mode is the existence of the marker file, nothing more
    pub fn is_night_mode(&self) -> bool {
        self.path(NIGHT_MODE_FILE).exists()
    }

    /// Create or delete the marker. Both directions are idempotent.
    pub fn set_night_mode(&self, enabled: bool) -> Result<(), StateError> {
        let path = self.path(NIGHT_MODE_FILE);
        if enabled {
            if path.exists() {
                return Ok(());
            }
            write_file(&path, b"")
        } else {
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(StateError::Io { path, source }),
            }
        }
    }
}
