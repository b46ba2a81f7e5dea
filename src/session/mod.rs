pub mod controller;
pub mod state;

pub use controller::{Capabilities, SessionController, SessionPlan};
pub use state::{SessionPhase, SessionSnapshot, SessionState};
