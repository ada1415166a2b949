use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// Every lifecycle change of the session timer produces a `TimerEvent`.
/// The block monitor, the session recorder and the auto-continue policy
/// all consume these; the timer is the only producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimerEvent {
    ModeChanged {
        previous: TimerMode,
        current: TimerMode,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    Started {
        mode: TimerMode,
        duration_secs: u64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    Paused {
        mode: TimerMode,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// Periodic countdown update while running.
    Tick {
        mode: TimerMode,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// Exactly one `Completed` fires per elapsed session. The timer does not
    /// reschedule itself; the next mode is set by whoever reacts to this.
    Completed {
        mode: TimerMode,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
}

impl TimerEvent {
    /// Timestamp carried by the event.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TimerEvent::ModeChanged { at, .. }
            | TimerEvent::Started { at, .. }
            | TimerEvent::Paused { at, .. }
            | TimerEvent::Tick { at, .. }
            | TimerEvent::Completed { at, .. } => *at,
        }
    }
}
