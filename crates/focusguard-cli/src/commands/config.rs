use clap::Subcommand;
use focusguard_core::storage::Settings;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a value by dot-separated key, e.g. durations.focus_minutes
    Get { key: String },
    /// Set a value by dot-separated key
    Set { key: String, value: String },
    /// Print all settings as TOML
    Show,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let settings = Settings::load()?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key '{key}'").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;
            settings.set(&key, &value)?;
            println!("{key} = {}", settings.get(&key).unwrap_or_default());
        }
        ConfigAction::Show => {
            let settings = Settings::load()?;
            print!("{}", toml::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}
