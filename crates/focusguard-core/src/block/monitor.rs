//! Block monitor: the scan loop coordinator.
//!
//! Subscribes to session timer events through [`BlockMonitor::handle_event`]
//! and keeps a recurring scan task running exactly while enforcement should
//! be active. The scan itself runs on a blocking worker so process
//! enumeration never stalls the timer tick cadence.
//!
//! Cancellation is cooperative, not preemptive: `stop_monitoring` prevents
//! any further pass from starting but lets an in-flight pass finish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::block::inspector::ProcessInspector;
use crate::block::rules::SharedRuleSet;
use crate::block::scan;
use crate::events::TimerEvent;
use crate::notify::NotificationSink;
use crate::timer::now_ms;

/// Fixed scan period. Detection latency up to one period is acceptable.
pub const SCAN_PERIOD: Duration = Duration::from_secs(2);

struct MonitorState {
    /// Cancellation token of the running scan task, if any.
    active: Option<CancellationToken>,
    /// Set by `shutdown`; makes every later `start_monitoring` a no-op.
    shut_down: bool,
}

/// Coordinates the recurring scan against the shared rule set.
///
/// All public operations are idempotent. The monitor never dies from a
/// transient failure; only `stop_monitoring`/`shutdown` stop it.
pub struct BlockMonitor<I: ProcessInspector + 'static> {
    rules: SharedRuleSet,
    inspector: Arc<Mutex<I>>,
    sink: Arc<dyn NotificationSink>,
    period: Duration,
    state: Mutex<MonitorState>,
    /// Mirror of the timer's running flag, maintained from events, so a
    /// `ModeChanged` mid-session can re-evaluate activation.
    timer_running: AtomicBool,
}

impl<I: ProcessInspector + 'static> BlockMonitor<I> {
    pub fn new(rules: SharedRuleSet, inspector: Arc<Mutex<I>>, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_period(rules, inspector, sink, SCAN_PERIOD)
    }

    /// Same as [`BlockMonitor::new`] with a custom scan period (tests).
    pub fn with_period(
        rules: SharedRuleSet,
        inspector: Arc<Mutex<I>>,
        sink: Arc<dyn NotificationSink>,
        period: Duration,
    ) -> Self {
        Self {
            rules,
            inspector,
            sink,
            period,
            state: Mutex::new(MonitorState {
                active: None,
                shut_down: false,
            }),
            timer_running: AtomicBool::new(false),
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.lock().unwrap().active.is_some()
    }

    /// Schedule the recurring scan, first pass immediate. No-op if already
    /// monitoring or shut down. Must be called from within a tokio runtime.
    pub fn start_monitoring(&self) {
        let mut state = self.state.lock().unwrap();
        if state.shut_down || state.active.is_some() {
            return;
        }
        let token = CancellationToken::new();
        state.active = Some(token.clone());
        drop(state);

        log::info!("block monitor started (period {:?})", self.period);
        tokio::spawn(scan_loop(
            Arc::clone(&self.rules),
            Arc::clone(&self.inspector),
            Arc::clone(&self.sink),
            self.period,
            token,
        ));
    }

    /// Cancel the recurring scan. An in-flight pass finishes; no new pass
    /// starts after this returns. No-op if not monitoring.
    pub fn stop_monitoring(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(token) = state.active.take() {
            token.cancel();
            log::info!("block monitor stopped");
        }
    }

    /// Event-free stop for timer resets. A reset stops the clock without a
    /// `Paused` event, so the running mirror is cleared here; otherwise a
    /// later `ModeChanged` would evaluate activation against a stale
    /// running flag and restart scanning while the timer is stopped.
    pub fn timer_stopped(&self) {
        self.timer_running.store(false, Ordering::SeqCst);
        self.stop_monitoring();
    }

    /// React to a session timer event per the enforcement contract:
    /// `Started` begins monitoring when enforcement is active for the new
    /// session, `Paused`/`Completed` stop it unconditionally, `ModeChanged`
    /// re-evaluates activation mid-session.
    pub fn handle_event(&self, event: &TimerEvent) {
        match event {
            TimerEvent::Started { mode, .. } => {
                self.timer_running.store(true, Ordering::SeqCst);
                let active = {
                    let rules = self.rules.read().unwrap();
                    rules.enforcement_active(*mode, true)
                };
                if active {
                    self.start_monitoring();
                }
            }
            TimerEvent::Paused { .. } | TimerEvent::Completed { .. } => {
                self.timer_running.store(false, Ordering::SeqCst);
                self.stop_monitoring();
            }
            TimerEvent::ModeChanged { current, .. } => {
                let running = self.timer_running.load(Ordering::SeqCst);
                let active = {
                    let rules = self.rules.read().unwrap();
                    rules.enforcement_active(*current, running)
                };
                if active {
                    self.start_monitoring();
                } else {
                    self.stop_monitoring();
                }
            }
            TimerEvent::Tick { .. } => {}
        }
    }

    /// Stop monitoring and refuse any future start. Safe to call multiple
    /// times; never leaves a dangling scheduled scan.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shut_down = true;
        if let Some(token) = state.active.take() {
            token.cancel();
        }
    }
}

impl<I: ProcessInspector + 'static> Drop for BlockMonitor<I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The recurring scan task. One pass at a time: the next due tick is not
/// processed until the current pass returns, and ticks missed meanwhile are
/// skipped, never queued.
async fn scan_loop<I: ProcessInspector + 'static>(
    rules: SharedRuleSet,
    inspector: Arc<Mutex<I>>,
    sink: Arc<dyn NotificationSink>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Grace-period bookkeeping, private to this task.
    let mut first_seen: HashMap<String, u64> = HashMap::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let rules_snapshot = { rules.read().unwrap().clone() };
                let inspector = Arc::clone(&inspector);
                let sink = Arc::clone(&sink);
                let mut seen = std::mem::take(&mut first_seen);

                let pass = tokio::task::spawn_blocking(move || {
                    let mut inspector = inspector.lock().unwrap();
                    let report =
                        scan::run_pass(&mut *inspector, &rules_snapshot, &mut seen, now_ms(), sink.as_ref());
                    (seen, report)
                })
                .await;

                match pass {
                    Ok((seen, report)) => {
                        first_seen = seen;
                        if !report.outcomes.is_empty() {
                            log::debug!(
                                "scan pass: {} rule(s) matched, {} failure(s)",
                                report.outcomes.len(),
                                report.failures()
                            );
                        }
                    }
                    Err(err) => {
                        // A panicking pass loses its grace bookkeeping but
                        // never kills the schedule.
                        log::error!("scan pass panicked: {err}");
                    }
                }
            }
            _ = token.cancelled() => {
                log::debug!("scan loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::inspector::testing::ScriptedInspector;
    use crate::block::rules::{shared, AppBlockRule, BlockAction, BlockRuleSet};
    use crate::notify::testing::CollectingSink;
    use crate::timer::TimerMode;
    use chrono::Utc;

    fn enabled_rules(app_rules: Vec<AppBlockRule>, focus_only: bool) -> BlockRuleSet {
        BlockRuleSet {
            is_enabled: true,
            focus_sessions_only: focus_only,
            app_rules,
            site_rules: Vec::new(),
        }
    }

    fn monitor_with(
        rules: BlockRuleSet,
        inspector: ScriptedInspector,
    ) -> (
        BlockMonitor<ScriptedInspector>,
        Arc<Mutex<ScriptedInspector>>,
        Arc<CollectingSink>,
    ) {
        let inspector = Arc::new(Mutex::new(inspector));
        let sink = Arc::new(CollectingSink::default());
        let monitor = BlockMonitor::with_period(
            shared(rules),
            Arc::clone(&inspector),
            sink.clone(),
            Duration::from_millis(20),
        );
        (monitor, inspector, sink)
    }

    fn started(mode: TimerMode) -> TimerEvent {
        TimerEvent::Started {
            mode,
            duration_secs: 60,
            remaining_ms: 60_000,
            at: Utc::now(),
        }
    }

    fn paused() -> TimerEvent {
        TimerEvent::Paused {
            mode: TimerMode::Focus,
            remaining_ms: 30_000,
            at: Utc::now(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_and_stop_are_idempotent() {
        let (monitor, _, _) = monitor_with(
            enabled_rules(Vec::new(), true),
            ScriptedInspector::default(),
        );
        assert!(!monitor.is_monitoring());

        monitor.start_monitoring();
        monitor.start_monitoring();
        assert!(monitor.is_monitoring());

        monitor.stop_monitoring();
        monitor.stop_monitoring();
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_after_shutdown_is_a_noop() {
        let (monitor, _, _) = monitor_with(
            enabled_rules(Vec::new(), true),
            ScriptedInspector::default(),
        );
        monitor.shutdown();
        monitor.shutdown();
        monitor.start_monitoring();
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn warn_rule_fires_during_focus_session_and_stops_on_pause() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], true);
        let (monitor, _, sink) =
            monitor_with(rules, ScriptedInspector::with_processes(&[(7, "chrome")]));

        monitor.handle_event(&started(TimerMode::Focus));
        assert!(monitor.is_monitoring());

        // A few scan periods: at least one trigger notification.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let during = sink.delivered.lock().unwrap().len();
        assert!(during >= 1, "expected at least one trigger, got {during}");

        monitor.handle_event(&paused());
        assert!(!monitor.is_monitoring());

        // Let any in-flight pass drain, then confirm no further dispatch.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let after_pause = sink.delivered.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.delivered.lock().unwrap().len(), after_pause);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn focus_only_rules_do_not_scan_during_breaks() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], true);
        let (monitor, inspector, sink) =
            monitor_with(rules, ScriptedInspector::with_processes(&[(7, "chrome")]));

        monitor.handle_event(&started(TimerMode::ShortBreak));
        assert!(!monitor.is_monitoring());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(inspector.lock().unwrap().scan_count, 0);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_rule_set_never_starts_monitoring() {
        let mut rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], true);
        rules.is_enabled = false;
        let (monitor, _, _) =
            monitor_with(rules, ScriptedInspector::with_processes(&[(7, "chrome")]));

        monitor.handle_event(&started(TimerMode::Focus));
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mode_change_after_timer_stopped_does_not_restart_scanning() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], true);
        let (monitor, _, _) =
            monitor_with(rules, ScriptedInspector::with_processes(&[(7, "chrome")]));

        monitor.handle_event(&started(TimerMode::Focus));
        assert!(monitor.is_monitoring());

        // A reset stops the clock without emitting any event.
        monitor.timer_stopped();
        assert!(!monitor.is_monitoring());

        // Switching mode on a stopped timer must not bring enforcement back.
        monitor.handle_event(&TimerEvent::ModeChanged {
            previous: TimerMode::Focus,
            current: TimerMode::Focus,
            duration_secs: 1500,
            at: Utc::now(),
        });
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mode_change_to_break_stops_enforcement_mid_session() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], true);
        let (monitor, _, _) =
            monitor_with(rules, ScriptedInspector::with_processes(&[(7, "chrome")]));

        monitor.handle_event(&started(TimerMode::Focus));
        assert!(monitor.is_monitoring());

        monitor.handle_event(&TimerEvent::ModeChanged {
            previous: TimerMode::Focus,
            current: TimerMode::ShortBreak,
            duration_secs: 300,
            at: Utc::now(),
        });
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_stops_monitoring() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], true);
        let (monitor, _, _) =
            monitor_with(rules, ScriptedInspector::with_processes(&[(7, "chrome")]));

        monitor.handle_event(&started(TimerMode::Focus));
        assert!(monitor.is_monitoring());
        monitor.handle_event(&TimerEvent::Completed {
            mode: TimerMode::Focus,
            duration_secs: 60,
            at: Utc::now(),
        });
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rule_set_disabled_mid_session_stops_actions_on_next_pass() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], false);
        let shared_rules = shared(rules);
        let inspector = Arc::new(Mutex::new(ScriptedInspector::with_processes(&[(
            7, "chrome",
        )])));
        let sink = Arc::new(CollectingSink::default());
        let monitor = BlockMonitor::with_period(
            Arc::clone(&shared_rules),
            Arc::clone(&inspector),
            sink.clone(),
            Duration::from_millis(20),
        );

        monitor.handle_event(&started(TimerMode::Focus));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!sink.delivered.lock().unwrap().is_empty());

        // Clear the global flag mid-session; the session keeps running.
        shared_rules.write().unwrap().is_enabled = false;
        tokio::time::sleep(Duration::from_millis(60)).await;
        let settled = sink.delivered.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.delivered.lock().unwrap().len(), settled);

        monitor.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rule_toggled_mid_monitoring_applies_on_next_pass() {
        let rules = enabled_rules(vec![AppBlockRule::new("chrome", BlockAction::Warn)], false);
        let shared_rules = shared(rules);
        let inspector = Arc::new(Mutex::new(ScriptedInspector::with_processes(&[(
            7, "chrome",
        )])));
        let sink = Arc::new(CollectingSink::default());
        let monitor = BlockMonitor::with_period(
            Arc::clone(&shared_rules),
            Arc::clone(&inspector),
            sink.clone(),
            Duration::from_millis(20),
        );

        monitor.handle_event(&started(TimerMode::Focus));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!sink.delivered.lock().unwrap().is_empty());

        // Deactivate the rule by whole-record replacement.
        {
            let mut rules = shared_rules.write().unwrap();
            let mut replaced = rules.app_rules[0].clone();
            replaced.is_active = false;
            rules.app_rules[0] = replaced;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        let settled = sink.delivered.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.delivered.lock().unwrap().len(), settled);

        monitor.shutdown();
    }
}
