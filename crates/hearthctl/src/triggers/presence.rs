use serde::Serialize;
use tracing::info;

use crate::engine::{TransitionEngine, TransitionResult};
use crate::store::{Presence, StateError};

/// What a presence update observed and did
#[derive(Debug, Clone, Serialize)]
pub struct PresenceChange {
    pub previous: Presence,
    pub current: Presence,
    pub transition: Option<TransitionResult>,
}

/// Record a presence observation and run away/home on a real change.
///
/// A previous `unknown` only records the new value: on first run there's no
/// way to tell whether anyone actually left or arrived.
pub async fn apply_presence(
    engine: &TransitionEngine,
    is_home: bool,
) -> Result<PresenceChange, StateError> {
    let store = engine.store();
    let previous = store.read_presence();
    let current = Presence::from_home(is_home);

    if engine.dry_run() {
        info!("Dry run: would record presence {}", current);
    } else {
        store.write_presence(is_home)?;
    }

    let transition = match (previous, current) {
        (Presence::Home, Presence::Away) => {
            info!("Presence changed home → away");
            Some(engine.away().await)
        }
        (Presence::Away, Presence::Home) => {
            info!("Presence changed away → home");
            Some(engine.home(true).await)
        }
        (Presence::Unknown, _) => {
            info!("Presence was unknown, recording {} without a transition", current);
            None
        }
        _ => None,
    };

    Ok(PresenceChange {
        previous,
        current,
        transition,
    })
}
