//! Durable session state: the project and the conversation, keyed by session.
//!
//! Values are stored as JSON under `(session_id, key)`. The store does no
//! interpretation beyond (de)serialization; an absent key is not an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use vibeforge_common::{Message, Project};

const PROJECT_KEY: &str = "project";
const CONVERSATION_KEY: &str = "conversation";

/// Persistence boundary used by the orchestrator.
pub trait SessionStore: Send + Sync {
    fn save_project(&self, session_id: &str, project: &Project) -> Result<()>;
    fn save_conversation(&self, session_id: &str, conversation: &[Message]) -> Result<()>;
    fn load_project(&self, session_id: &str) -> Result<Option<Project>>;
    fn load_conversation(&self, session_id: &str) -> Result<Option<Vec<Message>>>;
    /// Drop everything stored for the session.
    fn clear(&self, session_id: &str) -> Result<()>;
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("Failed to serialize {}", key))
}

fn decode<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    raw.map(|raw| {
        serde_json::from_str(&raw).with_context(|| format!("Stored {} is not valid JSON", key))
    })
    .transpose()
}

// ── SQLite ───────────────────────────────────────────────────────────

pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the session database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session database {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_kv (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (session_id, key)
            );",
        )
        .context("Failed to create session_kv table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Session DB lock poisoned: {}", e))
    }

    fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO session_kv (session_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id, key)
                 DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![session_id, key, value],
            )
            .with_context(|| format!("Failed to write {} for session {}", key, session_id))?;
        Ok(())
    }

    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row(
                "SELECT value FROM session_kv WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read {} for session {}", key, session_id))
    }

    /// Session ids with stored state, most recently updated first.
    pub fn sessions(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id FROM session_kv
             GROUP BY session_id ORDER BY MAX(updated_at) DESC, session_id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

impl SessionStore for SqliteSessionStore {
    fn save_project(&self, session_id: &str, project: &Project) -> Result<()> {
        self.set(session_id, PROJECT_KEY, &encode(PROJECT_KEY, project)?)
    }

    fn save_conversation(&self, session_id: &str, conversation: &[Message]) -> Result<()> {
        self.set(
            session_id,
            CONVERSATION_KEY,
            &encode(CONVERSATION_KEY, conversation)?,
        )
    }

    fn load_project(&self, session_id: &str) -> Result<Option<Project>> {
        decode(PROJECT_KEY, self.get(session_id, PROJECT_KEY)?)
    }

    fn load_conversation(&self, session_id: &str) -> Result<Option<Vec<Message>>> {
        decode(CONVERSATION_KEY, self.get(session_id, CONVERSATION_KEY)?)
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM session_kv WHERE session_id = ?1",
                params![session_id],
            )
            .with_context(|| format!("Failed to clear session {}", session_id))?;
        Ok(())
    }
}

// ── In-memory ────────────────────────────────────────────────────────

/// Process-local store. Nothing outlives the process.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Session store lock poisoned: {}", e))
    }

    fn set(&self, session_id: &str, key: &str, value: String) -> Result<()> {
        self.entries()?
            .insert((session_id.to_string(), key.to_string()), value);
        Ok(())
    }

    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries()?
            .get(&(session_id.to_string(), key.to_string()))
            .cloned())
    }
}

impl SessionStore for MemorySessionStore {
    fn save_project(&self, session_id: &str, project: &Project) -> Result<()> {
        self.set(session_id, PROJECT_KEY, encode(PROJECT_KEY, project)?)
    }

    fn save_conversation(&self, session_id: &str, conversation: &[Message]) -> Result<()> {
        self.set(
            session_id,
            CONVERSATION_KEY,
            encode(CONVERSATION_KEY, conversation)?,
        )
    }

    fn load_project(&self, session_id: &str) -> Result<Option<Project>> {
        decode(PROJECT_KEY, self.get(session_id, PROJECT_KEY)?)
    }

    fn load_conversation(&self, session_id: &str) -> Result<Option<Vec<Message>>> {
        decode(CONVERSATION_KEY, self.get(session_id, CONVERSATION_KEY)?)
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        self.entries()?.retain(|(id, _), _| id != session_id);
        Ok(())
    }
}
