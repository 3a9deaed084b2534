mod result;
mod transitions;

pub use result::TransitionKind;
pub use result::TransitionResult;
pub use result::TransitionStatus;
pub use transitions::Devices;
pub use transitions::EngineSettings;
pub use transitions::TransitionEngine;
