use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Key under which the deployment flag is stored.
pub const DEPLOYED_KEY: &str = "isDeployed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentState {
    #[default]
    NotDeployed,
    Deployed,
}

impl DeploymentState {
    pub fn is_deployed(&self) -> bool {
        matches!(self, DeploymentState::Deployed)
    }

    /// The literal persisted for this state.
    pub fn as_flag(&self) -> &'static str {
        match self {
            DeploymentState::Deployed => "true",
            DeploymentState::NotDeployed => "false",
        }
    }

    /// Only the exact literal `"true"` counts as deployed.
    pub fn from_flag(value: &str) -> Self {
        if value == "true" {
            DeploymentState::Deployed
        } else {
            DeploymentState::NotDeployed
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentState::Deployed => f.write_str("deployed"),
            DeploymentState::NotDeployed => f.write_str("not deployed"),
        }
    }
}

/// Durable home of the deployment flag.
///
/// Backed by a single-table SQLite database so the flag survives a restart of
/// the page session the same way it would survive a browser reload.
pub struct FlagStore {
    conn: Connection,
}

impl FlagStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        let store = FlagStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = FlagStore {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS flags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Current persisted state. Never fails: anything unreadable is `NotDeployed`.
    pub fn read(&self) -> DeploymentState {
        match self.raw_value() {
            Ok(Some(value)) => DeploymentState::from_flag(&value),
            Ok(None) => {
                debug!("No deployment flag persisted yet");
                DeploymentState::NotDeployed
            }
            Err(e) => {
                warn!("Failed to read deployment flag, assuming not deployed: {}", e);
                DeploymentState::NotDeployed
            }
        }
    }

    pub fn write(&self, state: DeploymentState) -> Result<()> {
        self.conn.execute(
            "INSERT INTO flags (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![DEPLOYED_KEY, state.as_flag(), Utc::now().timestamp()],
        )?;
        debug!("Persisted deployment flag: {}", state.as_flag());
        Ok(())
    }

    /// When the flag was last written, if ever.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.conn
            .query_row(
                "SELECT updated_at FROM flags WHERE key = ?1",
                params![DEPLOYED_KEY],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .ok()
            .flatten()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
    }

    fn raw_value(&self) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM flags WHERE key = ?1",
                params![DEPLOYED_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn write_raw(&self, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO flags (key, value, updated_at) VALUES (?1, ?2, 0)",
            params![DEPLOYED_KEY, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_literal_true_is_deployed() {
        let store = FlagStore::in_memory().unwrap();

        for value in ["TRUE", "1", "yes", "", "false"] {
            store.write_raw(value).unwrap();
            assert_eq!(store.read(), DeploymentState::NotDeployed, "value {:?}", value);
        }

        store.write_raw("true").unwrap();
        assert_eq!(store.read(), DeploymentState::Deployed);
    }

    #[test]
    fn test_last_updated_tracks_writes() {
        let store = FlagStore::in_memory().unwrap();
        assert!(store.last_updated().is_none());

        let before = Utc::now().timestamp();
        store.write(DeploymentState::Deployed).unwrap();
        let stamp = store.last_updated().unwrap().timestamp();

        assert!(stamp >= before);
    }
}
