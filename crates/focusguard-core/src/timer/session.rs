//! Session timer state machine.
//!
//! Wall-clock based: no internal threads, the caller invokes `tick()`
//! periodically (~100ms-1s). Commands return the event they produced, if
//! any; callers forward events to the block monitor, the recorder and the
//! auto-continue policy.
//!
//! ## State transitions
//!
//! ```text
//! Stopped <-> Running, each parameterized by (mode, duration, remaining)
//! ```
//!
//! The machine is cyclic and reusable for the life of the process: a
//! completed session leaves it stopped with `remaining == 0`, waiting for
//! the next `set_mode`/`start`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::stopwatch::{now_ms, Stopwatch};
use crate::events::TimerEvent;

/// Timer mode. Determines the default duration lookup and whether block
/// enforcement can apply (`focus_sessions_only` rule sets only enforce in
/// `Focus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
    Custom,
}

impl TimerMode {
    pub fn is_focus(self) -> bool {
        self == TimerMode::Focus
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerMode::Focus => write!(f, "focus"),
            TimerMode::ShortBreak => write!(f, "short-break"),
            TimerMode::LongBreak => write!(f, "long-break"),
            TimerMode::Custom => write!(f, "custom"),
        }
    }
}

/// Point-in-time view of the timer, safe to hand to concurrent readers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub session_duration_ms: u64,
    pub remaining_ms: u64,
    pub is_running: bool,
}

/// The session timer.
///
/// Invariants:
/// - `remaining_ms <= session_duration_ms`
/// - `remaining_ms` only decreases while running
/// - `is_running()` and the stopwatch running flag are the same flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTimer {
    mode: TimerMode,
    previous_mode: TimerMode,
    session_duration_ms: u64,
    remaining_ms: u64,
    label: String,
    category: String,
    stopwatch: Stopwatch,
}

impl SessionTimer {
    /// Create a timer in the given mode, stopped, with a full session ahead.
    pub fn new(mode: TimerMode, duration_ms: u64) -> Self {
        Self {
            mode,
            previous_mode: mode,
            session_duration_ms: duration_ms,
            remaining_ms: duration_ms,
            label: String::new(),
            category: String::new(),
            stopwatch: Stopwatch::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn previous_mode(&self) -> TimerMode {
        self.previous_mode
    }

    pub fn session_duration_ms(&self) -> u64 {
        self.session_duration_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn is_running(&self) -> bool {
        self.stopwatch.is_running()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            session_duration_ms: self.session_duration_ms,
            remaining_ms: self.remaining_ms,
            is_running: self.is_running(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Switch mode and duration. Valid in any state; the clock's running
    /// flag is preserved but its elapsed count restarts, so the new session
    /// begins with `remaining == duration`.
    pub fn set_mode(&mut self, mode: TimerMode, duration_ms: u64) -> TimerEvent {
        self.set_mode_at(mode, duration_ms, now_ms())
    }

    pub fn set_mode_at(&mut self, mode: TimerMode, duration_ms: u64, now: u64) -> TimerEvent {
        let was_running = self.is_running();
        self.previous_mode = self.mode;
        self.mode = mode;
        self.session_duration_ms = duration_ms;
        self.remaining_ms = duration_ms;
        self.stopwatch.reset();
        if was_running {
            self.stopwatch.start_at(now);
        }
        TimerEvent::ModeChanged {
            previous: self.previous_mode,
            current: mode,
            duration_secs: duration_ms / 1000,
            at: Utc::now(),
        }
    }

    /// Start the clock. No-op (`None`) if already running.
    pub fn start(&mut self) -> Option<TimerEvent> {
        self.start_at(now_ms())
    }

    pub fn start_at(&mut self, now: u64) -> Option<TimerEvent> {
        if self.is_running() {
            return None;
        }
        self.stopwatch.start_at(now);
        Some(TimerEvent::Started {
            mode: self.mode,
            duration_secs: self.session_duration_ms / 1000,
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    /// Pause the clock, retaining elapsed time. No-op (`None`) if stopped.
    pub fn pause(&mut self) -> Option<TimerEvent> {
        self.pause_at(now_ms())
    }

    pub fn pause_at(&mut self, now: u64) -> Option<TimerEvent> {
        if !self.is_running() {
            return None;
        }
        self.stopwatch.stop_at(now);
        self.remaining_ms = self
            .session_duration_ms
            .saturating_sub(self.stopwatch.elapsed_at(now));
        Some(TimerEvent::Paused {
            mode: self.mode,
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    /// Stop the clock and restore a full session. Emits no event.
    pub fn reset(&mut self) {
        self.stopwatch.reset();
        self.remaining_ms = self.session_duration_ms;
    }

    /// Recompute remaining time. Returns `Completed` exactly once when the
    /// session elapses, `Tick` otherwise; `None` when stopped.
    ///
    /// On completion the clock is stopped and its elapsed count reset, but
    /// the next mode/duration is NOT scheduled here -- a collaborator
    /// reacting to `Completed` decides what comes next.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        self.tick_at(now_ms())
    }

    pub fn tick_at(&mut self, now: u64) -> Option<TimerEvent> {
        if !self.is_running() {
            return None;
        }
        self.remaining_ms = self
            .session_duration_ms
            .saturating_sub(self.stopwatch.elapsed_at(now));
        if self.remaining_ms == 0 {
            self.stopwatch.reset();
            return Some(TimerEvent::Completed {
                mode: self.mode,
                duration_secs: self.session_duration_ms / 1000,
                at: Utc::now(),
            });
        }
        Some(TimerEvent::Tick {
            mode: self.mode,
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }
}

impl Default for SessionTimer {
    /// 25-minute focus session, stopped.
    fn default() -> Self {
        Self::new(TimerMode::Focus, 25 * 60 * 1000)
    }
}
