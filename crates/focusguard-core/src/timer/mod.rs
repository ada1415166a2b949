mod policy;
mod session;
mod stopwatch;

pub use policy::AutoContinue;
pub use session::{SessionTimer, TimerMode, TimerSnapshot};
pub use stopwatch::{now_ms, Stopwatch};
