//! Session facade and scenario replay

pub mod scenario;
pub mod session;

pub use scenario::{Scenario, ScenarioFrame};
pub use session::{CycleOutput, NavigationSession, SessionState};
