//! Entry points shared by the CLI and the webhook server.
//!
//! Each trigger reads the state store, decides whether a transition is due,
//! runs it and records what happened.

mod alerts;
mod arrival;
mod presence;
mod scheduler;

pub use alerts::{check_temperature, check_temperature_at, FREEZE_ALERT};
pub use arrival::{handle_arrival, ArrivalOutcome, ArrivalStage};
pub use presence::{apply_presence, PresenceChange};
pub use scheduler::{scheduler_tick, scheduler_tick_at};
