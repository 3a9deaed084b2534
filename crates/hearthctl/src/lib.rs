pub mod api;
pub mod config;
pub mod devices;
pub mod engine;
pub mod hvac;
pub mod notify;
pub mod store;
pub mod triggers;
pub mod weather;

pub use config::format_diagnostics;
pub use config::Config;
pub use config::Diagnostic;
pub use config::LogLevel;
pub use engine::TransitionEngine;
pub use engine::TransitionKind;
pub use engine::TransitionResult;
pub use engine::TransitionStatus;
pub use store::StateStore;
