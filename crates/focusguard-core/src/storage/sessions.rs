//! SQLite-based session history.
//!
//! Stores finalized sessions (immutable historical facts), aggregate
//! statistics, and a key-value table the CLI uses to persist timer state
//! between invocations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{Result, StorageError};
use crate::timer::TimerMode;

/// A finalized session. Created when a session starts, finalized exactly
/// once when it completes or is interrupted, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub label: String,
    pub category: String,
    pub was_interrupted: bool,
    pub mode: TimerMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub completed_focus_sessions: u64,
    pub interrupted_sessions: u64,
}

fn mode_str(mode: TimerMode) -> &'static str {
    match mode {
        TimerMode::Focus => "focus",
        TimerMode::ShortBreak => "short-break",
        TimerMode::LongBreak => "long-break",
        TimerMode::Custom => "custom",
    }
}

fn mode_from_str(s: &str) -> TimerMode {
    match s {
        "short-break" => TimerMode::ShortBreak,
        "long-break" => TimerMode::LongBreak,
        "custom" => TimerMode::Custom,
        _ => TimerMode::Focus,
    }
}

/// SQLite database for session history and persisted state.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Open the database at `~/.config/focusguard/focusguard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("focusguard.db");
        let conn = Connection::open(&path)
            .map_err(|source| StorageError::OpenFailed { path, source })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id              TEXT PRIMARY KEY,
                    mode            TEXT NOT NULL,
                    label           TEXT NOT NULL DEFAULT '',
                    category        TEXT NOT NULL DEFAULT '',
                    duration_min    INTEGER NOT NULL,
                    was_interrupted INTEGER NOT NULL DEFAULT 0,
                    started_at      TEXT NOT NULL,
                    ended_at        TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON sessions(ended_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_mode ON sessions(mode);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Append a finalized session.
    pub fn append(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, mode, label, category, duration_min, was_interrupted, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                mode_str(session.mode),
                session.label,
                session.category,
                session.duration_minutes,
                session.was_interrupted,
                session.start_time.to_rfc3339(),
                session.end_time.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All sessions, oldest first.
    pub fn load_all(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, label, category, duration_min, was_interrupted, started_at, ended_at
             FROM sessions ORDER BY started_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let mode: String = row.get(1)?;
            let started: String = row.get(6)?;
            let ended: String = row.get(7)?;
            Ok(Session {
                id: row.get(0)?,
                mode: mode_from_str(&mode),
                label: row.get(2)?,
                category: row.get(3)?,
                duration_minutes: row.get(4)?,
                was_interrupted: row.get(5)?,
                start_time: started
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
                end_time: ended.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
            })
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(StorageError::from)?);
        }
        Ok(sessions)
    }

    /// Remove one session by id.
    pub fn remove(&self, id: &str) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StorageError::SessionNotFound(id.to_string()).into());
        }
        Ok(())
    }

    /// Aggregate totals since `since` (pass `None` for all time).
    pub fn stats(&self, since: Option<DateTime<Utc>>) -> Result<Stats> {
        let cutoff = since
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "0000".to_string());
        let mut stmt = self.conn.prepare(
            "SELECT mode, was_interrupted, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE ended_at >= ?1
             GROUP BY mode, was_interrupted",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;
        for row in rows {
            let (mode, interrupted, count, minutes) = row.map_err(StorageError::from)?;
            stats.total_sessions += count;
            if interrupted {
                stats.interrupted_sessions += count;
            }
            match mode_from_str(&mode) {
                TimerMode::Focus | TimerMode::Custom => {
                    stats.total_focus_min += minutes;
                    if !interrupted {
                        stats.completed_focus_sessions += count;
                    }
                }
                TimerMode::ShortBreak | TimerMode::LongBreak => {
                    stats.total_break_min += minutes;
                }
            }
        }
        Ok(stats)
    }

    /// Aggregate totals for today (UTC).
    pub fn stats_today(&self) -> Result<Stats> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc());
        self.stats(midnight)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mode: TimerMode, minutes: u32, interrupted: bool) -> Session {
        let now = Utc::now();
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            start_time: now - chrono::Duration::minutes(i64::from(minutes)),
            end_time: now,
            duration_minutes: minutes,
            label: "test".into(),
            category: String::new(),
            was_interrupted: interrupted,
            mode,
        }
    }

    #[test]
    fn append_and_load_round_trip() {
        let store = SessionStore::open_memory().unwrap();
        let session = sample(TimerMode::Focus, 25, false);
        store.append(&session).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, session.id);
        assert_eq!(all[0].mode, TimerMode::Focus);
        assert_eq!(all[0].duration_minutes, 25);
        assert!(!all[0].was_interrupted);
    }

    #[test]
    fn remove_by_id() {
        let store = SessionStore::open_memory().unwrap();
        let session = sample(TimerMode::ShortBreak, 5, false);
        store.append(&session).unwrap();
        store.remove(&session.id).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert!(store.remove(&session.id).is_err());
    }

    #[test]
    fn stats_split_focus_and_break() {
        let store = SessionStore::open_memory().unwrap();
        store.append(&sample(TimerMode::Focus, 25, false)).unwrap();
        store.append(&sample(TimerMode::Focus, 25, true)).unwrap();
        store
            .append(&sample(TimerMode::ShortBreak, 5, false))
            .unwrap();

        let stats = store.stats(None).unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.total_focus_min, 50);
        assert_eq!(stats.total_break_min, 5);
        assert_eq!(stats.completed_focus_sessions, 1);
        assert_eq!(stats.interrupted_sessions, 1);
    }

    #[test]
    fn kv_store_round_trip() {
        let store = SessionStore::open_memory().unwrap();
        assert!(store.kv_get("timer").unwrap().is_none());
        store.kv_set("timer", "{}").unwrap();
        assert_eq!(store.kv_get("timer").unwrap().unwrap(), "{}");
        store.kv_set("timer", "{\"a\":1}").unwrap();
        assert_eq!(store.kv_get("timer").unwrap().unwrap(), "{\"a\":1}");
    }
}
