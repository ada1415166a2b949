use std::sync::{Arc, Mutex};

use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use focusguard_core::block::SystemInspector;
use focusguard_core::notify::{LogSink, NotificationSink};
use focusguard_core::storage::{SessionStore, Settings, SettingsManager};
use focusguard_core::timer::TimerMode;
use focusguard_core::FocusController;

#[derive(Subcommand)]
pub enum FocusAction {
    /// Run a focus session in the foreground until it completes or ctrl-c
    Run {
        /// Session length in minutes (default: configured focus duration)
        #[arg(long)]
        minutes: Option<u32>,
        /// Keep rolling into breaks and new sessions until interrupted
        #[arg(long)]
        auto_continue: bool,
        /// Label recorded with the session
        #[arg(long)]
        label: Option<String>,
        /// Category recorded with the session
        #[arg(long)]
        category: Option<String>,
    },
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        FocusAction::Run {
            minutes,
            auto_continue,
            label,
            category,
        } => run_session(minutes, auto_continue, label, category),
    }
}

fn run_session(
    minutes: Option<u32>,
    auto_continue: bool,
    label: Option<String>,
    category: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load()?;
    if auto_continue {
        settings.auto_continue = true;
    }
    let duration_ms = minutes.map(|m| u64::from(m) * 60 * 1000);

    let manager = Arc::new(SettingsManager::from_settings(settings));
    let store = SessionStore::open()?;
    let inspector = Arc::new(Mutex::new(SystemInspector::new()));
    let sink: Arc<dyn NotificationSink> = Arc::new(LogSink::default());
    let controller = FocusController::new(manager, store, inspector, sink);
    controller.set_context(label.unwrap_or_default(), category.unwrap_or_default());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        controller.set_mode(TimerMode::Focus, duration_ms);
        controller.start();
        println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);

        let cancel = CancellationToken::new();
        let cancel_on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received, ending session");
                cancel_on_signal.cancel();
            }
        });

        controller.run(cancel).await;
        controller.shutdown();
        println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
        Ok(())
    })
}
