pub(crate) mod inspector;
mod monitor;
mod rules;
mod scan;

pub use inspector::{ProcessInfo, ProcessInspector, SystemInspector};
pub use monitor::{BlockMonitor, SCAN_PERIOD};
pub use rules::{
    shared, AppBlockRule, BlockAction, BlockRuleSet, SharedRuleSet, SiteBlockRule,
};
pub use scan::{run_pass, RuleDisposition, RuleOutcome, ScanReport};
