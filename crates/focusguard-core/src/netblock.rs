//! Hosts-file / firewall boundary for site rules.
//!
//! Domain blocking needs elevated privileges and platform-specific command
//! plumbing; none of that lives in this crate. The engine talks to an
//! implementation of [`DomainBlocker`] and treats every call as
//! best-effort: `Ok(false)` or a permission error never takes the timer or
//! the monitor down.

use crate::error::PermissionError;

/// External collaborator that edits the hosts file and firewall rules.
///
/// All operations fail closed: on any problem other than missing
/// privileges they return `Ok(false)`; missing privileges surface as
/// `Err(PermissionError::ElevationRequired)` so callers can tell the user
/// instead of silently retrying.
pub trait DomainBlocker: Send + Sync {
    /// Redirect the given domains in the hosts file.
    fn block_domains(&self, domains: &[String]) -> Result<bool, PermissionError>;

    /// Remove redirects; `None` removes everything this tool added.
    fn unblock_domains(&self, domains: Option<&[String]>) -> Result<bool, PermissionError>;

    /// Create a named outbound-block firewall rule for an executable.
    fn create_outbound_block_rule(&self, name: &str, path: &str)
        -> Result<bool, PermissionError>;

    /// Remove a named firewall rule.
    fn remove_rule(&self, name: &str) -> Result<bool, PermissionError>;
}

/// Default implementation for unprivileged processes: every call reports
/// the missing elevation. Lets the rest of the engine run unchanged where
/// no privileged helper is installed.
#[derive(Debug, Default)]
pub struct UnprivilegedBlocker;

impl DomainBlocker for UnprivilegedBlocker {
    fn block_domains(&self, domains: &[String]) -> Result<bool, PermissionError> {
        log::info!("domain block skipped for {} domain(s): not elevated", domains.len());
        Err(PermissionError::ElevationRequired {
            operation: "block_domains".into(),
        })
    }

    fn unblock_domains(&self, _domains: Option<&[String]>) -> Result<bool, PermissionError> {
        Err(PermissionError::ElevationRequired {
            operation: "unblock_domains".into(),
        })
    }

    fn create_outbound_block_rule(
        &self,
        name: &str,
        _path: &str,
    ) -> Result<bool, PermissionError> {
        log::info!("firewall rule '{name}' skipped: not elevated");
        Err(PermissionError::ElevationRequired {
            operation: "create_outbound_block_rule".into(),
        })
    }

    fn remove_rule(&self, _name: &str) -> Result<bool, PermissionError> {
        Err(PermissionError::ElevationRequired {
            operation: "remove_rule".into(),
        })
    }
}

/// Apply all active site rules through a blocker, best-effort. Returns the
/// number of domains actually blocked.
pub fn apply_site_rules(
    blocker: &dyn DomainBlocker,
    rules: &crate::block::BlockRuleSet,
) -> usize {
    let domains: Vec<String> = rules
        .active_site_rules()
        .flat_map(|rule| rule.blocked_domains())
        .collect();
    if domains.is_empty() {
        return 0;
    }
    match blocker.block_domains(&domains) {
        Ok(true) => domains.len(),
        Ok(false) => {
            log::warn!("domain blocking reported failure for {} domain(s)", domains.len());
            0
        }
        Err(err) => {
            log::warn!("domain blocking unavailable: {err}");
            0
        }
    }
}
