//! Elapsed-time source for the session timer.
//!
//! Operates on epoch-millisecond deltas with explicit-time variants so tests
//! can simulate elapse without sleeping. A stopped stopwatch retains its
//! accumulated elapsed time until `reset`.

use serde::{Deserialize, Serialize};

/// Current wall clock in epoch milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stopwatch {
    /// Elapsed time accumulated across previous run intervals.
    accumulated_ms: u64,
    /// Epoch ms at which the current run interval started, if running.
    started_at_ms: Option<u64>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn start(&mut self) {
        self.start_at(now_ms());
    }

    /// No-op if already running.
    pub fn start_at(&mut self, now: u64) {
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(now);
        }
    }

    pub fn stop(&mut self) {
        self.stop_at(now_ms());
    }

    /// Stops the clock, retaining elapsed time. No-op if not running.
    pub fn stop_at(&mut self, now: u64) {
        if let Some(started) = self.started_at_ms.take() {
            self.accumulated_ms += now.saturating_sub(started);
        }
    }

    /// Stops the clock and discards all elapsed time.
    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
        self.started_at_ms = None;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_at(now_ms())
    }

    pub fn elapsed_at(&self, now: u64) -> u64 {
        let running = self
            .started_at_ms
            .map(|started| now.saturating_sub(started))
            .unwrap_or(0);
        self.accumulated_ms + running
    }
}
