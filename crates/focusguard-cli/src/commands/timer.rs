use clap::Subcommand;
use focusguard_core::storage::{SessionStore, Settings};
use focusguard_core::timer::{SessionTimer, TimerMode};
use focusguard_core::TimerEvent;

const TIMER_KEY: &str = "session_timer";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Switch timer mode
    SetMode {
        /// focus, short-break, long-break or custom
        mode: String,
        /// Session length in minutes (default: configured duration)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Start or resume the countdown
    Start,
    /// Pause the countdown, retaining remaining time
    Pause,
    /// Stop and restore a full session
    Reset,
    /// Print current timer state as JSON
    Status,
}

fn parse_mode(s: &str) -> Result<TimerMode, String> {
    match s {
        "focus" => Ok(TimerMode::Focus),
        "short-break" => Ok(TimerMode::ShortBreak),
        "long-break" => Ok(TimerMode::LongBreak),
        "custom" => Ok(TimerMode::Custom),
        other => Err(format!(
            "unknown mode '{other}' (expected focus, short-break, long-break or custom)"
        )),
    }
}

fn load_timer(db: &SessionStore) -> SessionTimer {
    if let Ok(Some(json)) = db.kv_get(TIMER_KEY) {
        if let Ok(timer) = serde_json::from_str::<SessionTimer>(&json) {
            return timer;
        }
    }
    SessionTimer::default()
}

fn save_timer(db: &SessionStore, timer: &SessionTimer) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(timer)?;
    db.kv_set(TIMER_KEY, &json)?;
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SessionStore::open()?;
    let mut timer = load_timer(&db);

    match action {
        TimerAction::SetMode { mode, minutes } => {
            let mode = parse_mode(&mode)?;
            let settings = Settings::load()?;
            let duration_ms = minutes
                .map(|m| u64::from(m) * 60 * 1000)
                .unwrap_or_else(|| settings.durations.duration_ms(mode));
            let event = timer.set_mode(mode, duration_ms);
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Start => {
            if let Some(event) = timer.start() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&timer.snapshot())?);
            }
        }
        TimerAction::Pause => {
            if let Some(event) = timer.pause() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&timer.snapshot())?);
            }
        }
        TimerAction::Reset => {
            timer.reset();
            println!("{{\"type\": \"timer_reset\"}}");
        }
        TimerAction::Status => {
            // Tick to bring remaining time up to date before printing.
            let event = timer.tick();
            println!("{}", serde_json::to_string_pretty(&timer.snapshot())?);
            if let Some(event @ TimerEvent::Completed { .. }) = event {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
        }
    }

    save_timer(&db, &timer)?;
    Ok(())
}
