pub mod controls;
pub mod doctor;
pub mod glitch;
pub mod mission;
pub mod preflight;
pub mod scenario;
pub mod session;
pub mod wait;

pub use glitch::{GlitchSchedule, GlitchState};
pub use mission::{Mission, MissionError, MissionItem};
pub use scenario::{Outcome, Scenario};
pub use session::{FlightOptions, Session};
pub use wait::{WaitResult, WaitStatus};
