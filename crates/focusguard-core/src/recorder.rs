//! Session recorder: turns timer events into immutable session history.
//!
//! A session record is opened when a session starts and finalized exactly
//! once, either as completed (on `Completed`) or as interrupted (on an
//! explicit abandon). Resuming from pause does not open a new record.

use chrono::{DateTime, Utc};

use crate::events::TimerEvent;
use crate::storage::{Session, SessionStore};
use crate::timer::TimerMode;

/// An open, not-yet-finalized session.
#[derive(Debug, Clone)]
struct OpenSession {
    id: String,
    mode: TimerMode,
    started_at: DateTime<Utc>,
}

pub struct SessionRecorder {
    store: SessionStore,
    open: Option<OpenSession>,
    label: String,
    category: String,
}

impl SessionRecorder {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            open: None,
            label: String::new(),
            category: String::new(),
        }
    }

    /// Label/category applied to sessions finalized from now on.
    pub fn set_context(&mut self, label: impl Into<String>, category: impl Into<String>) {
        self.label = label.into();
        self.category = category.into();
    }

    pub fn has_open_session(&self) -> bool {
        self.open.is_some()
    }

    /// Feed a timer event through the recorder. Storage failures are
    /// logged; the recorder never takes the timer down.
    pub fn handle_event(&mut self, event: &TimerEvent) {
        match event {
            TimerEvent::Started { mode, at, .. } => {
                // Resume-from-pause keeps the original record open.
                if self.open.is_none() {
                    self.open = Some(OpenSession {
                        id: uuid::Uuid::new_v4().to_string(),
                        mode: *mode,
                        started_at: *at,
                    });
                }
            }
            TimerEvent::Completed { at, .. } => {
                self.finalize(*at, false);
            }
            TimerEvent::ModeChanged { .. } => {
                // A mode switch abandons any session still open.
                self.abandon();
            }
            TimerEvent::Paused { .. } | TimerEvent::Tick { .. } => {}
        }
    }

    /// Finalize any open session as interrupted (reset, shutdown, ctrl-c).
    pub fn abandon(&mut self) {
        self.finalize(Utc::now(), true);
    }

    fn finalize(&mut self, ended_at: DateTime<Utc>, interrupted: bool) {
        let Some(open) = self.open.take() else {
            return;
        };
        // end_time >= start_time even if clocks misbehave.
        let ended_at = ended_at.max(open.started_at);
        let duration_minutes = (ended_at - open.started_at).num_minutes().max(0) as u32;
        let session = Session {
            id: open.id,
            start_time: open.started_at,
            end_time: ended_at,
            duration_minutes,
            label: self.label.clone(),
            category: self.category.clone(),
            was_interrupted: interrupted,
            mode: open.mode,
        };
        if let Err(err) = self.store.append(&session) {
            log::error!("failed to persist session {}: {err}", session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(mode: TimerMode, at: DateTime<Utc>) -> TimerEvent {
        TimerEvent::Started {
            mode,
            duration_secs: 1500,
            remaining_ms: 1_500_000,
            at,
        }
    }

    #[test]
    fn completed_session_is_persisted_once() {
        let store = SessionStore::open_memory().unwrap();
        let mut recorder = SessionRecorder::new(store);
        let start = Utc::now();

        recorder.handle_event(&started(TimerMode::Focus, start));
        assert!(recorder.has_open_session());

        recorder.handle_event(&TimerEvent::Completed {
            mode: TimerMode::Focus,
            duration_secs: 1500,
            at: start + chrono::Duration::minutes(25),
        });
        assert!(!recorder.has_open_session());

        let all = recorder.store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].was_interrupted);
        assert_eq!(all[0].duration_minutes, 25);
        assert!(all[0].end_time >= all[0].start_time);
    }

    #[test]
    fn pause_resume_keeps_one_record() {
        let store = SessionStore::open_memory().unwrap();
        let mut recorder = SessionRecorder::new(store);
        let start = Utc::now();

        recorder.handle_event(&started(TimerMode::Focus, start));
        recorder.handle_event(&TimerEvent::Paused {
            mode: TimerMode::Focus,
            remaining_ms: 60_000,
            at: start,
        });
        recorder.handle_event(&started(TimerMode::Focus, start + chrono::Duration::minutes(5)));
        recorder.handle_event(&TimerEvent::Completed {
            mode: TimerMode::Focus,
            duration_secs: 1500,
            at: start + chrono::Duration::minutes(30),
        });

        let all = recorder.store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].start_time, start);
    }

    #[test]
    fn abandon_marks_interrupted() {
        let store = SessionStore::open_memory().unwrap();
        let mut recorder = SessionRecorder::new(store);
        recorder.set_context("writing", "work");

        recorder.handle_event(&started(TimerMode::Focus, Utc::now()));
        recorder.abandon();

        let all = recorder.store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].was_interrupted);
        assert_eq!(all[0].label, "writing");
        // Double abandon is a no-op.
        recorder.abandon();
        assert_eq!(recorder.store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn mode_change_abandons_open_session() {
        let store = SessionStore::open_memory().unwrap();
        let mut recorder = SessionRecorder::new(store);

        recorder.handle_event(&started(TimerMode::Focus, Utc::now()));
        recorder.handle_event(&TimerEvent::ModeChanged {
            previous: TimerMode::Focus,
            current: TimerMode::ShortBreak,
            duration_secs: 300,
            at: Utc::now(),
        });

        let all = recorder.store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].was_interrupted);
        assert!(!recorder.has_open_session());
    }
}
