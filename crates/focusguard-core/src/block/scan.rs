//! One scan pass: match running processes against the rule set and dispatch
//! actions.
//!
//! A pass never aborts on a per-rule failure: every active rule is evaluated
//! and acted on independently, and whatever goes wrong is recorded in the
//! returned [`ScanReport`] and logged. Grace-period state lives in the
//! caller-owned first-seen map and is private to the monitor.

use std::collections::HashMap;
use std::time::Duration;

use crate::block::inspector::{ProcessInfo, ProcessInspector};
use crate::block::rules::{AppBlockRule, BlockAction, BlockRuleSet};
use crate::notify::{Notification, NotificationSink};

/// What happened to one matched rule during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDisposition {
    /// Warn rule fired; the process keeps running.
    Warned,
    /// Every matched instance was asked to terminate; pids that were still
    /// alive after the bounded wait are listed in `survivors`.
    Terminated { survivors: Vec<u32> },
    /// Kill rule matched but its grace period has not elapsed yet.
    GraceWaiting { remaining_secs: u64 },
    /// Reserved action (`CloseWindow`, `BlockNetwork`): recorded, not
    /// enforced.
    NotEnforced,
    /// The action failed outright (e.g. access denied on every instance).
    Failed(String),
}

/// Per-rule record of one pass.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub process_name: String,
    pub action: BlockAction,
    pub matched_pids: Vec<u32>,
    pub disposition: RuleDisposition,
}

/// Result of one full scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub outcomes: Vec<RuleOutcome>,
    /// Process enumeration failed; no rules were evaluated this pass.
    pub enumeration_failed: bool,
}

impl ScanReport {
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, RuleDisposition::Failed(_)))
            .count()
    }
}

/// How long a kill waits for the process to exit before being treated as
/// failed rather than hung.
pub(crate) const KILL_WAIT: Duration = Duration::from_secs(3);

/// Run one pass over the rule set.
///
/// `first_seen` maps kill-rule ids to the epoch-ms instant their process was
/// first detected; entries are dropped as soon as the rule stops matching so
/// a relaunched process gets a fresh grace period.
pub fn run_pass(
    inspector: &mut dyn ProcessInspector,
    rules: &BlockRuleSet,
    first_seen: &mut HashMap<String, u64>,
    now_ms: u64,
    sink: &dyn NotificationSink,
) -> ScanReport {
    let mut report = ScanReport::default();

    // The enabled flag is re-checked every pass: clearing it mid-session
    // takes effect on the next tick, not at the end of the session.
    if !rules.is_enabled {
        first_seen.clear();
        return report;
    }

    let processes = match inspector.running_processes() {
        Ok(processes) => processes,
        Err(err) => {
            log::warn!("process enumeration failed, skipping pass: {err}");
            report.enumeration_failed = true;
            return report;
        }
    };

    let mut matched_this_pass = std::collections::HashSet::new();
    for rule in rules.active_app_rules() {
        let matched: Vec<&ProcessInfo> =
            processes.iter().filter(|p| rule.matches(&p.name)).collect();
        if matched.is_empty() {
            continue;
        }
        matched_this_pass.insert(rule.id.clone());
        let outcome = dispatch(inspector, rule, &matched, first_seen, now_ms, sink);
        report.outcomes.push(outcome);
    }

    // Unmatched rules lose their first-seen stamp: the grace period restarts
    // if the process comes back.
    first_seen.retain(|rule_id, _| matched_this_pass.contains(rule_id));

    report
}

fn dispatch(
    inspector: &mut dyn ProcessInspector,
    rule: &AppBlockRule,
    matched: &[&ProcessInfo],
    first_seen: &mut HashMap<String, u64>,
    now_ms: u64,
    sink: &dyn NotificationSink,
) -> RuleOutcome {
    let matched_pids: Vec<u32> = matched.iter().map(|p| p.pid).collect();
    let disposition = match rule.action {
        BlockAction::Warn => {
            notify_trigger(sink, rule);
            RuleDisposition::Warned
        }
        BlockAction::KillProcess => {
            let first = *first_seen.entry(rule.id.clone()).or_insert(now_ms);
            let grace_ms = u64::from(rule.grace_period_secs) * 1000;
            if now_ms < first + grace_ms {
                let remaining_ms = first + grace_ms - now_ms;
                RuleDisposition::GraceWaiting {
                    remaining_secs: remaining_ms.div_ceil(1000),
                }
            } else {
                let disposition = terminate_all(inspector, rule, &matched_pids);
                // The notification reports the policy trigger, not the
                // termination outcome.
                notify_trigger(sink, rule);
                disposition
            }
        }
        BlockAction::CloseWindow | BlockAction::BlockNetwork => {
            log::info!(
                "rule '{}' action {} not enforced (reserved)",
                rule.friendly_name,
                rule.action
            );
            RuleDisposition::NotEnforced
        }
    };

    RuleOutcome {
        rule_id: rule.id.clone(),
        process_name: rule.process_name.clone(),
        action: rule.action,
        matched_pids,
        disposition,
    }
}

fn terminate_all(
    inspector: &mut dyn ProcessInspector,
    rule: &AppBlockRule,
    pids: &[u32],
) -> RuleDisposition {
    let mut survivors = Vec::new();
    let mut errors = Vec::new();
    for &pid in pids {
        match inspector.terminate(pid, KILL_WAIT) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!(
                    "pid {pid} ('{}') outlived the kill wait",
                    rule.process_name
                );
                survivors.push(pid);
            }
            Err(err) => {
                log::warn!("terminating pid {pid} ('{}') failed: {err}", rule.process_name);
                errors.push(err.to_string());
            }
        }
    }
    if !errors.is_empty() && survivors.is_empty() && errors.len() == pids.len() {
        RuleDisposition::Failed(errors.join("; "))
    } else {
        RuleDisposition::Terminated { survivors }
    }
}

fn notify_trigger(sink: &dyn NotificationSink, rule: &AppBlockRule) {
    let notification = Notification::FocusLockTriggered {
        app_name: rule.friendly_name.clone(),
    };
    if let Err(err) = sink.notify(&notification) {
        log::warn!("notification delivery failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::inspector::testing::ScriptedInspector;
    use crate::block::rules::BlockRuleSet;
    use crate::notify::testing::CollectingSink;

    fn kill_rule(name: &str, grace_secs: u32) -> AppBlockRule {
        let mut rule = AppBlockRule::new(name, BlockAction::KillProcess);
        rule.grace_period_secs = grace_secs;
        rule
    }

    fn rule_set(rules: Vec<AppBlockRule>) -> BlockRuleSet {
        BlockRuleSet {
            is_enabled: true,
            focus_sessions_only: true,
            app_rules: rules,
            site_rules: Vec::new(),
        }
    }

    #[test]
    fn warn_rule_notifies_without_killing() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "Chrome")]);
        let rules = rule_set(vec![AppBlockRule::new("chrome", BlockAction::Warn)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].disposition, RuleDisposition::Warned);
        assert!(inspector.terminated.is_empty());
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn kill_without_grace_terminates_on_first_detection() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "steam"), (11, "steam")]);
        let rules = rule_set(vec![kill_rule("steam", 0)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 1_000, &sink);

        assert!(matches!(
            report.outcomes[0].disposition,
            RuleDisposition::Terminated { ref survivors } if survivors.is_empty()
        ));
        assert_eq!(inspector.terminated, vec![10, 11]);
        // Notification raised despite (because of) the kill.
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn grace_period_defers_then_terminates() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "steam")]);
        let rules = rule_set(vec![kill_rule("steam", 5)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        // T = 0: first detection, no kill.
        let report = run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);
        assert!(matches!(
            report.outcomes[0].disposition,
            RuleDisposition::GraceWaiting { remaining_secs: 5 }
        ));
        assert!(inspector.terminated.is_empty());
        assert!(sink.delivered.lock().unwrap().is_empty());

        // T = 4.9s: still within grace.
        let report = run_pass(&mut inspector, &rules, &mut first_seen, 4_900, &sink);
        assert!(matches!(
            report.outcomes[0].disposition,
            RuleDisposition::GraceWaiting { .. }
        ));
        assert!(inspector.terminated.is_empty());

        // T = 5s: first pass at/after first_seen + grace terminates.
        let report = run_pass(&mut inspector, &rules, &mut first_seen, 5_000, &sink);
        assert!(matches!(
            report.outcomes[0].disposition,
            RuleDisposition::Terminated { .. }
        ));
        assert_eq!(inspector.terminated, vec![10]);
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn grace_restarts_after_process_exits() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "steam")]);
        let rules = rule_set(vec![kill_rule("steam", 10)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);
        assert!(first_seen.contains_key(&rules.app_rules[0].id));

        // Process exits on its own; first-seen stamp is dropped.
        inspector.processes.clear();
        run_pass(&mut inspector, &rules, &mut first_seen, 2_000, &sink);
        assert!(first_seen.is_empty());

        // Relaunch at T=60s: fresh grace period, no kill yet.
        inspector.processes.push(ProcessInfo {
            pid: 44,
            name: "steam".into(),
        });
        let report = run_pass(&mut inspector, &rules, &mut first_seen, 60_000, &sink);
        assert!(matches!(
            report.outcomes[0].disposition,
            RuleDisposition::GraceWaiting { .. }
        ));
    }

    #[test]
    fn failed_rule_does_not_block_later_rules() {
        let mut inspector =
            ScriptedInspector::with_processes(&[(10, "protected"), (20, "steam")]);
        inspector.denied_pids = vec![10];
        let rules = rule_set(vec![kill_rule("protected", 0), kill_rule("steam", 0)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);

        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(
            report.outcomes[0].disposition,
            RuleDisposition::Failed(_)
        ));
        assert!(matches!(
            report.outcomes[1].disposition,
            RuleDisposition::Terminated { .. }
        ));
        assert_eq!(inspector.terminated, vec![20]);
        assert_eq!(report.failures(), 1);
        // Both rules still raised their notification.
        assert_eq!(sink.delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn reserved_actions_do_not_throw() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "chrome")]);
        let rules = rule_set(vec![
            AppBlockRule::new("chrome", BlockAction::CloseWindow),
        ]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);
        assert_eq!(report.outcomes[0].disposition, RuleDisposition::NotEnforced);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn enumeration_failure_skips_pass_without_panicking() {
        let mut inspector = ScriptedInspector::with_processes(&[]);
        inspector.fail_enumeration = true;
        let rules = rule_set(vec![kill_rule("steam", 0)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);
        assert!(report.enumeration_failed);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn disabled_rule_set_dispatches_nothing() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "steam")]);
        let mut rules = rule_set(vec![kill_rule("steam", 0)]);
        rules.is_enabled = false;
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::from([("stale".to_string(), 0)]);

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 1_000, &sink);

        assert!(report.outcomes.is_empty());
        assert!(inspector.terminated.is_empty());
        assert!(sink.delivered.lock().unwrap().is_empty());
        // Grace bookkeeping does not survive a disable.
        assert!(first_seen.is_empty());
    }

    #[test]
    fn inactive_and_unmatched_rules_produce_no_outcome() {
        let mut inspector = ScriptedInspector::with_processes(&[(10, "chrome")]);
        let mut off = AppBlockRule::new("chrome", BlockAction::Warn);
        off.is_active = false;
        let rules = rule_set(vec![off, AppBlockRule::new("discord", BlockAction::Warn)]);
        let sink = CollectingSink::default();
        let mut first_seen = HashMap::new();

        let report = run_pass(&mut inspector, &rules, &mut first_seen, 0, &sink);
        assert!(report.outcomes.is_empty());
    }
}
