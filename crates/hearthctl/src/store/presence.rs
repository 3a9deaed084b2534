use serde::Serialize;
use strum::Display;
use strum::EnumString;
use tracing::debug;

use super::{write_file, StateError, StateStore, PRESENCE_FILE};

/// Whether anyone is home, as last recorded by a presence trigger.
///
/// `Unknown` is its own answer: a first run with no file must not look like
/// everyone just left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Home,
    Away,
    Unknown,
}

impl Presence {
    pub fn from_home(is_home: bool) -> Self {
        if is_home {
            Presence::Home
        } else {
            Presence::Away
        }
    }
}

impl StateStore {
    pub fn read_presence(&self) -> Presence {
        let path = self.path(PRESENCE_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                debug!("Unrecognised presence value {:?}, treating as unknown", raw);
                Presence::Unknown
            }),
            Err(_) => Presence::Unknown,
        }
    }

    pub fn write_presence(&self, is_home: bool) -> Result<(), StateError> {
        let presence = Presence::from_home(is_home);
        write_file(&self.path(PRESENCE_FILE), presence.to_string().as_bytes())
    }
}
