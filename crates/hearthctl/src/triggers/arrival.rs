use serde::Serialize;
use strum::Display;
use strum::EnumString;
use tracing::info;

use crate::engine::{TransitionEngine, TransitionResult};
use crate::store::{Presence, StateError};

/// Two-stage arrival: a geofence fires while still on the way, then the
/// network sees the phone once actually home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArrivalStage {
    Approaching,
    Arrived,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrivalOutcome {
    pub stage: ArrivalStage,

    /// Presence already read `home` before this stage ran
    pub already_home: bool,

    pub transition: Option<TransitionResult>,
}

/// Stage 1 pre-conditions the house silently. Stage 2 runs home again with a
/// notification; device calls are idempotent so a house stage 1 already
/// handled just reports its current settings.
pub async fn handle_arrival(
    engine: &TransitionEngine,
    stage: ArrivalStage,
) -> Result<ArrivalOutcome, StateError> {
    let store = engine.store();
    let already_home = store.read_presence() == Presence::Home;

    let transition = match stage {
        ArrivalStage::Approaching if already_home => {
            info!("Approaching but presence is already home, nothing to do");
            None
        }
        ArrivalStage::Approaching => Some(engine.home(false).await),
        ArrivalStage::Arrived => {
            if already_home {
                info!("Arrived after pre-conditioning, sending summary");
            }
            Some(engine.home(true).await)
        }
    };

    if transition.is_some() {
        if engine.dry_run() {
            info!("Dry run: would record presence home");
        } else {
            store.write_presence(true)?;
        }
    }

    Ok(ArrivalOutcome {
        stage,
        already_home,
        transition,
    })
}
