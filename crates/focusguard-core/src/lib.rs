//! FocusGuard core: a focus-session engine with enforcement.
//!
//! The crate combines a pomodoro-style session timer with a block monitor
//! that scans running processes against user rules during enforced
//! sessions. Frontends (the CLI, a future tray app) drive the
//! [`FocusController`], which fans timer events out to the monitor, the
//! session recorder and the notification sink.

pub mod block;
pub mod controller;
pub mod error;
pub mod events;
pub mod netblock;
pub mod notify;
pub mod recorder;
pub mod storage;
pub mod timer;

pub use block::{
    AppBlockRule, BlockAction, BlockMonitor, BlockRuleSet, ProcessInfo, ProcessInspector,
    SharedRuleSet, SiteBlockRule, SystemInspector,
};
pub use controller::FocusController;
pub use error::{CoreError, Result};
pub use events::TimerEvent;
pub use notify::{LogSink, Notification, NotificationSink};
pub use recorder::SessionRecorder;
pub use storage::{Session, SessionStore, Settings, SettingsManager, Stats};
pub use timer::{SessionTimer, TimerMode, TimerSnapshot};
