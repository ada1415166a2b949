//! Wires the session timer to the block monitor, the session recorder and
//! the notification sink.
//!
//! The controller owns the tick task; every event a timer command produces
//! flows through [`FocusController::dispatch`] to all consumers, so there
//! is exactly one subscription path and no global event bus. Construction
//! is explicit and fallible -- nothing initializes in a detached task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::block::{BlockMonitor, ProcessInspector};
use crate::events::TimerEvent;
use crate::notify::{Notification, NotificationSink};
use crate::recorder::SessionRecorder;
use crate::storage::{SessionStore, SettingsManager};
use crate::timer::{AutoContinue, SessionTimer, TimerMode, TimerSnapshot};

/// Cadence of the countdown tick task. Completion is detected within one
/// tick of the session actually elapsing.
pub const TICK_PERIOD: Duration = Duration::from_millis(250);

pub struct FocusController<I: ProcessInspector + 'static> {
    settings: Arc<SettingsManager>,
    timer: Mutex<SessionTimer>,
    monitor: BlockMonitor<I>,
    recorder: Mutex<SessionRecorder>,
    sink: Arc<dyn NotificationSink>,
    auto: Mutex<AutoContinue>,
}

impl<I: ProcessInspector + 'static> FocusController<I> {
    /// Build a controller over already-initialized collaborators. Fails
    /// loudly at the call site instead of deferring errors to a background
    /// task.
    pub fn new(
        settings: Arc<SettingsManager>,
        store: SessionStore,
        inspector: Arc<Mutex<I>>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let snapshot = settings.snapshot();
        let monitor = BlockMonitor::new(settings.rule_set(), inspector, Arc::clone(&sink));
        let timer = SessionTimer::new(
            TimerMode::Focus,
            snapshot.durations.duration_ms(TimerMode::Focus),
        );
        let auto = AutoContinue::new(snapshot.durations.sessions_before_long_break);
        Self {
            settings,
            timer: Mutex::new(timer),
            monitor,
            recorder: Mutex::new(SessionRecorder::new(store)),
            sink,
            auto: Mutex::new(auto),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.timer.lock().unwrap().snapshot()
    }

    /// Label/category recorded with sessions finalized from now on.
    pub fn set_context(&self, label: impl Into<String>, category: impl Into<String>) {
        self.recorder.lock().unwrap().set_context(label, category);
    }

    /// Switch mode; `duration_ms` defaults to the configured duration for
    /// that mode.
    pub fn set_mode(&self, mode: TimerMode, duration_ms: Option<u64>) -> TimerEvent {
        let duration = duration_ms
            .unwrap_or_else(|| self.settings.snapshot().durations.duration_ms(mode));
        let event = self.timer.lock().unwrap().set_mode(mode, duration);
        self.dispatch(&event);
        event
    }

    pub fn start(&self) -> Option<TimerEvent> {
        let event = self.timer.lock().unwrap().start()?;
        self.dispatch(&event);
        Some(event)
    }

    pub fn pause(&self) -> Option<TimerEvent> {
        let event = self.timer.lock().unwrap().pause()?;
        self.dispatch(&event);
        Some(event)
    }

    /// Stop the clock and restore a full session. Any open session record
    /// is finalized as interrupted; enforcement stops.
    pub fn reset(&self) {
        self.timer.lock().unwrap().reset();
        self.recorder.lock().unwrap().abandon();
        self.monitor.timer_stopped();
    }

    /// One countdown step. The timer lock is held only for the tick itself,
    /// never across dispatch side effects that might block.
    pub fn tick(&self) -> Option<TimerEvent> {
        let event = self.timer.lock().unwrap().tick()?;
        self.dispatch(&event);
        Some(event)
    }

    /// Fan an event out to every consumer.
    fn dispatch(&self, event: &TimerEvent) {
        self.monitor.handle_event(event);
        self.recorder.lock().unwrap().handle_event(event);
        if let TimerEvent::Completed { mode, .. } = event {
            let snapshot = self.settings.snapshot();
            if snapshot.notifications.enabled {
                let notification = Notification::SessionComplete { mode: *mode };
                if let Err(err) = self.sink.notify(&notification) {
                    log::warn!("completion notification failed: {err}");
                }
            }
        }
    }

    /// Drive the countdown until the session completes (auto-continue off)
    /// or until cancelled. With auto-continue on, completed sessions roll
    /// into the next mode indefinitely.
    ///
    /// Cancellation finalizes any open session as interrupted.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(TimerEvent::Completed { mode, .. }) = self.tick() {
                        let settings = self.settings.snapshot();
                        if !settings.auto_continue {
                            break;
                        }
                        let next = self.auto.lock().unwrap().next_mode(mode);
                        let duration = settings.durations.duration_ms(next);
                        self.set_mode(next, Some(duration));
                        self.start();
                    }
                }
                _ = cancel.cancelled() => {
                    self.pause();
                    self.recorder.lock().unwrap().abandon();
                    break;
                }
            }
        }
        self.monitor.stop_monitoring();
    }

    /// Dispose the monitor and finalize any open session. Idempotent.
    pub fn shutdown(&self) {
        self.monitor.shutdown();
        self.recorder.lock().unwrap().abandon();
    }
}
