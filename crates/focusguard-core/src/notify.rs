//! Notification sink boundary.
//!
//! Delivery mechanics (toasts, sounds) live in the host application; the
//! core only raises notifications through this trait. Sink failure is
//! logged by callers and never fatal to the timer or the monitor.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timer::TimerMode;

/// Opaque id assigned by the sink to a delivered notification.
pub type NotificationId = u64;

/// User-facing notifications the engine can raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Notification {
    SessionComplete { mode: TimerMode },
    /// A blocked app was detected during enforcement. Raised on warn and on
    /// kill alike -- it reports the policy trigger, not the termination
    /// outcome.
    FocusLockTriggered { app_name: String },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<NotificationId, CoreError>;
}

/// Default sink: writes notifications to the log and always succeeds.
#[derive(Debug, Default)]
pub struct LogSink {
    counter: std::sync::atomic::AtomicU64,
}

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) -> Result<NotificationId, CoreError> {
        match notification {
            Notification::SessionComplete { mode } => {
                log::info!("session complete: {mode}");
            }
            Notification::FocusLockTriggered { app_name } => {
                log::warn!("focus lock triggered by '{app_name}'");
            }
        }
        Ok(self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}
