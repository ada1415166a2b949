use clap::Subcommand;
use focusguard_core::block::{AppBlockRule, BlockAction};
use focusguard_core::storage::SettingsManager;

#[derive(Subcommand)]
pub enum RulesAction {
    /// Print the rule set as JSON
    List,
    /// Add a rule matching an application process name
    AddApp {
        /// Exact process name, e.g. chrome.exe (matched case-insensitively)
        process: String,
        /// warn, kill-process, close-window or block-network
        #[arg(long, default_value = "warn")]
        action: String,
        /// Seconds the process may keep running before a kill fires
        #[arg(long, default_value = "0")]
        grace: u32,
        /// Human-readable name shown in notifications
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a rule by id
    Remove { id: String },
    /// Enable enforcement, or a single rule by id
    Enable { id: Option<String> },
    /// Disable enforcement, or a single rule by id
    Disable { id: Option<String> },
}

fn parse_action(s: &str) -> Result<BlockAction, String> {
    match s {
        "warn" => Ok(BlockAction::Warn),
        "kill-process" | "kill" => Ok(BlockAction::KillProcess),
        "close-window" => Ok(BlockAction::CloseWindow),
        "block-network" => Ok(BlockAction::BlockNetwork),
        other => Err(format!(
            "unknown action '{other}' (expected warn, kill-process, close-window or block-network)"
        )),
    }
}

/// Flip `is_active` on whichever rule carries `id`. Returns false when no
/// rule matches.
fn set_rule_active(
    settings: &mut focusguard_core::storage::Settings,
    id: &str,
    active: bool,
) -> bool {
    for rule in &mut settings.rules.app_rules {
        if rule.id == id {
            rule.is_active = active;
            return true;
        }
    }
    for rule in &mut settings.rules.site_rules {
        if rule.id == id {
            rule.is_active = active;
            return true;
        }
    }
    false
}

pub fn run(action: RulesAction) -> Result<(), Box<dyn std::error::Error>> {
    let manager = SettingsManager::load()?;

    match action {
        RulesAction::List => {
            let settings = manager.snapshot();
            println!("{}", serde_json::to_string_pretty(&settings.rules)?);
        }
        RulesAction::AddApp {
            process,
            action,
            grace,
            name,
        } => {
            let action = parse_action(&action)?;
            let mut rule = AppBlockRule::new(&process, action);
            rule.grace_period_secs = grace;
            if let Some(name) = name {
                rule.friendly_name = name;
            }
            let id = rule.id.clone();
            manager.update(|s| s.rules.app_rules.push(rule))?;
            println!("{{\"added\": \"{id}\"}}");
        }
        RulesAction::Remove { id } => {
            let mut removed = false;
            manager.update(|s| {
                let before = s.rules.app_rules.len() + s.rules.site_rules.len();
                s.rules.app_rules.retain(|r| r.id != id);
                s.rules.site_rules.retain(|r| r.id != id);
                removed = s.rules.app_rules.len() + s.rules.site_rules.len() < before;
            })?;
            if !removed {
                return Err(format!("no rule with id '{id}'").into());
            }
            println!("{{\"removed\": \"{id}\"}}");
        }
        RulesAction::Enable { id } => {
            let mut found = true;
            manager.update(|s| match &id {
                Some(id) => found = set_rule_active(s, id, true),
                None => s.rules.is_enabled = true,
            })?;
            if !found {
                return Err(format!("no rule with id '{}'", id.unwrap_or_default()).into());
            }
            println!("{}", serde_json::to_string_pretty(&manager.snapshot().rules)?);
        }
        RulesAction::Disable { id } => {
            let mut found = true;
            manager.update(|s| match &id {
                Some(id) => found = set_rule_active(s, id, false),
                None => s.rules.is_enabled = false,
            })?;
            if !found {
                return Err(format!("no rule with id '{}'", id.unwrap_or_default()).into());
            }
            println!("{}", serde_json::to_string_pretty(&manager.snapshot().rules)?);
        }
    }

    Ok(())
}
