//! Sqlite-backed state store: one row of world state plus an append-only
//! activity log, both stored as JSON payloads. WAL keeps checkpoint
//! writes from stalling concurrent readers.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use contracts::{ActivityEvent, PersistedWorldState};
use town_core::{StateStore, StoreError};

const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS world_state (
    id        INTEGER PRIMARY KEY CHECK (id = 1),
    tick      INTEGER NOT NULL,
    payload   TEXT NOT NULL,
    saved_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS activity_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id  TEXT NOT NULL,
    tick      INTEGER NOT NULL,
    payload   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activity_agent ON activity_log (agent_id, id);
";

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path).map_err(backend)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(backend)?;
        conn.execute_batch(MIGRATIONS).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a previous statement panicked; the
        // connection itself is still usable.
        self.conn.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl StateStore for SqliteStateStore {
    fn save_state(&self, state: &PersistedWorldState) -> Result<(), StoreError> {
        let payload = serde_json::to_string(state)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        self.lock()
            .execute(
                "INSERT INTO world_state (id, tick, payload) VALUES (1, ?1, ?2)
                 ON CONFLICT (id) DO UPDATE SET
                     tick = excluded.tick,
                     payload = excluded.payload,
                     saved_at = datetime('now')",
                params![state.tick as i64, payload],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn load_state(&self) -> Result<Option<PersistedWorldState>, StoreError> {
        let payload: Option<String> = self
            .lock()
            .query_row("SELECT payload FROM world_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(backend)?;
        match payload {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|err| StoreError::Corrupt(err.to_string())),
            None => Ok(None),
        }
    }

    fn append_activity(&self, event: &ActivityEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        self.lock()
            .execute(
                "INSERT INTO activity_log (agent_id, tick, payload) VALUES (?1, ?2, ?3)",
                params![event.agent_id(), event.tick() as i64, payload],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEvent>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare("SELECT payload FROM activity_log ORDER BY id DESC LIMIT ?1")
            .map_err(backend)?;
        let rows = statement
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(backend)?;

        let mut events = Vec::new();
        for payload in rows {
            let payload = payload.map_err(backend)?;
            events.push(
                serde_json::from_str(&payload)
                    .map_err(|err| StoreError::Corrupt(err.to_string()))?,
            );
        }
        Ok(events)
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
