use clap::Subcommand;
use focusguard_core::storage::SessionStore;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals for today (UTC)
    Today,
    /// All-time totals
    All,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = SessionStore::open()?;
    let stats = match action {
        StatsAction::Today => store.stats_today()?,
        StatsAction::All => store.stats(None)?,
    };
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
