//! Auto-continue policy: which mode follows a completed session.
//!
//! Focus alternates with short breaks, with a long break after every Nth
//! completed focus session. Breaks (long or short) and custom sessions
//! always return to focus.

use serde::{Deserialize, Serialize};

use super::TimerMode;

/// Tracks completed focus sessions to place long breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoContinue {
    /// Long break after this many completed focus sessions.
    sessions_before_long_break: u32,
    /// Focus sessions completed since the last long break.
    completed_focus: u32,
}

impl AutoContinue {
    pub fn new(sessions_before_long_break: u32) -> Self {
        Self {
            sessions_before_long_break: sessions_before_long_break.max(1),
            completed_focus: 0,
        }
    }

    pub fn completed_focus(&self) -> u32 {
        self.completed_focus
    }

    /// Record a completion and return the mode the next session should use.
    pub fn next_mode(&mut self, completed: TimerMode) -> TimerMode {
        match completed {
            TimerMode::Focus => {
                self.completed_focus += 1;
                if self.completed_focus % self.sessions_before_long_break == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::Custom => TimerMode::Focus,
            TimerMode::LongBreak => {
                self.completed_focus = 0;
                TimerMode::Focus
            }
        }
    }
}

impl Default for AutoContinue {
    fn default() -> Self {
        Self::new(4)
    }
}
