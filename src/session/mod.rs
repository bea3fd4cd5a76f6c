//! Scroll-session accounting for a single tab.

pub mod driver;
pub mod state;

pub use driver::{DriverExit, SessionDriver};
pub use state::{QuietOutcome, QuietTimer, SessionPhase, SessionState, QUIET_PERIOD};
