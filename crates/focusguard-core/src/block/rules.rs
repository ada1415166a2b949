//! Block rules: what to watch for and what to do about it.
//!
//! The rule set is user configuration, owned by the settings manager and
//! shared read-mostly with the scan loop. Updates replace whole rule
//! records; the monitor never mutates rules.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timer::TimerMode;

/// Action taken when a rule matches a running process.
///
/// `CloseWindow` and `BlockNetwork` are reserved: the scan pass records
/// them as not enforced instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockAction {
    Warn,
    KillProcess,
    CloseWindow,
    BlockNetwork,
}

impl std::fmt::Display for BlockAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockAction::Warn => write!(f, "warn"),
            BlockAction::KillProcess => write!(f, "kill-process"),
            BlockAction::CloseWindow => write!(f, "close-window"),
            BlockAction::BlockNetwork => write!(f, "block-network"),
        }
    }
}

/// A rule matching a running application by process name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppBlockRule {
    pub id: String,
    /// Match key: case-insensitive exact process name, not a substring.
    pub process_name: String,
    pub friendly_name: String,
    pub action: BlockAction,
    /// Seconds a matched process may keep running after first detection
    /// before `KillProcess` escalates to termination.
    #[serde(default)]
    pub grace_period_secs: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl AppBlockRule {
    pub fn new(process_name: impl Into<String>, action: BlockAction) -> Self {
        let process_name = process_name.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            friendly_name: process_name.clone(),
            process_name,
            action,
            grace_period_secs: 0,
            is_active: true,
        }
    }

    pub fn matches(&self, process_name: &str) -> bool {
        self.process_name.eq_ignore_ascii_case(process_name)
    }
}

/// A rule blocking a website domain. Structurally parallel to
/// [`AppBlockRule`]; enforcement is delegated to the hosts/firewall
/// collaborator, never scanned in-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteBlockRule {
    pub id: String,
    pub domain: String,
    pub friendly_name: String,
    pub action: BlockAction,
    #[serde(default)]
    pub include_subdomains: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SiteBlockRule {
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            friendly_name: domain.clone(),
            domain,
            action: BlockAction::BlockNetwork,
            include_subdomains: true,
            is_active: true,
        }
    }

    /// Domains handed to the hosts/firewall collaborator for this rule.
    pub fn blocked_domains(&self) -> Vec<String> {
        if self.include_subdomains {
            vec![self.domain.clone(), format!("www.{}", self.domain)]
        } else {
            vec![self.domain.clone()]
        }
    }
}

fn default_true() -> bool {
    true
}

/// The user-configured rule collection plus global enable flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRuleSet {
    #[serde(default)]
    pub is_enabled: bool,
    /// When set, rules only apply during `Focus` sessions.
    #[serde(default = "default_true")]
    pub focus_sessions_only: bool,
    #[serde(default)]
    pub app_rules: Vec<AppBlockRule>,
    #[serde(default)]
    pub site_rules: Vec<SiteBlockRule>,
}

impl Default for BlockRuleSet {
    fn default() -> Self {
        Self {
            is_enabled: false,
            focus_sessions_only: true,
            app_rules: Vec::new(),
            site_rules: Vec::new(),
        }
    }
}

impl BlockRuleSet {
    /// Enforcement is active iff blocking is enabled, the mode qualifies,
    /// and the timer is running. Pause or completion deactivates it
    /// immediately: enforcement never outlives the triggering session.
    pub fn enforcement_active(&self, mode: TimerMode, is_running: bool) -> bool {
        self.is_enabled && (!self.focus_sessions_only || mode.is_focus()) && is_running
    }

    /// Active app rules in definition order.
    pub fn active_app_rules(&self) -> impl Iterator<Item = &AppBlockRule> {
        self.app_rules.iter().filter(|r| r.is_active)
    }

    /// Active site rules in definition order.
    pub fn active_site_rules(&self) -> impl Iterator<Item = &SiteBlockRule> {
        self.site_rules.iter().filter(|r| r.is_active)
    }

    /// Rule ids must be unique within their list; process names and domains
    /// must be non-empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.app_rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ValidationError::DuplicateRuleId {
                    id: rule.id.clone(),
                    list: "app_rules".into(),
                });
            }
            if rule.process_name.trim().is_empty() {
                return Err(ValidationError::InvalidRule {
                    id: rule.id.clone(),
                    message: "process_name is empty".into(),
                });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for rule in &self.site_rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ValidationError::DuplicateRuleId {
                    id: rule.id.clone(),
                    list: "site_rules".into(),
                });
            }
            if rule.domain.trim().is_empty() {
                return Err(ValidationError::InvalidRule {
                    id: rule.id.clone(),
                    message: "domain is empty".into(),
                });
            }
        }
        Ok(())
    }
}

/// Rule set shared between the settings manager (writer) and the scan loop
/// (reader). Writers replace rule records wholesale under the lock, so a
/// scan sees either the pre- or post-update record, never a field-level mix.
pub type SharedRuleSet = Arc<RwLock<BlockRuleSet>>;

/// Wrap a rule set for sharing with the monitor.
pub fn shared(rules: BlockRuleSet) -> SharedRuleSet {
    Arc::new(RwLock::new(rules))
}
