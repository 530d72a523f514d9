use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::models::UserPreference;

/// Read side of user settings. The chat-command collaborator owns writes;
/// the reconciliation pipeline only lists.
pub trait PreferenceSource: Send + Sync {
    fn list_all(&self) -> Result<Vec<UserPreference>>;
}

/// SQLite-backed settings, one row per user. The upsert/remove operations
/// are the surface the chat collaborator calls.
pub struct SqlitePreferences {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS user_prefs (
    owner_id INTEGER PRIMARY KEY,
    profile_url TEXT NOT NULL DEFAULT '',
    region TEXT NOT NULL DEFAULT ''
)";

impl SqlitePreferences {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).context("could not open preferences database")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("preferences mutex poisoned")
    }

    pub fn upsert_profile(&self, owner_id: i64, profile_url: &str) -> Result<()> {
        self.lock()
            .execute(
                "INSERT INTO user_prefs (owner_id, profile_url) VALUES (?1, ?2)
                 ON CONFLICT(owner_id) DO UPDATE SET profile_url = excluded.profile_url",
                (owner_id, profile_url),
            )
            .context("could not upsert profile url")?;
        Ok(())
    }

    pub fn upsert_region(&self, owner_id: i64, region: &str) -> Result<()> {
        self.lock()
            .execute(
                "INSERT INTO user_prefs (owner_id, region) VALUES (?1, ?2)
                 ON CONFLICT(owner_id) DO UPDATE SET region = excluded.region",
                (owner_id, region),
            )
            .context("could not upsert region")?;
        Ok(())
    }

    pub fn remove(&self, owner_id: i64) -> Result<()> {
        self.lock()
            .execute("DELETE FROM user_prefs WHERE owner_id = ?1", [owner_id])
            .context("could not delete user preference")?;
        Ok(())
    }
}

impl PreferenceSource for SqlitePreferences {
    fn list_all(&self) -> Result<Vec<UserPreference>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT owner_id, profile_url, region FROM user_prefs")?;
        let rows = stmt.query_map([], |row| {
            Ok(UserPreference {
                owner_id: row.get(0)?,
                profile_url: row.get(1)?,
                region: row.get(2)?,
            })
        })?;
        let mut prefs = Vec::new();
        for row in rows {
            prefs.push(row?);
        }
        Ok(prefs)
    }
}

/// Fixed preference list, mainly for tests and dry runs.
pub struct MemoryPreferences {
    prefs: Vec<UserPreference>,
}

impl MemoryPreferences {
    pub fn new(prefs: Vec<UserPreference>) -> Self {
        Self { prefs }
    }
}

impl PreferenceSource for MemoryPreferences {
    fn list_all(&self) -> Result<Vec<UserPreference>> {
        Ok(self.prefs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upserts_merge_into_one_row_per_user() {
        let prefs = SqlitePreferences::open_in_memory().unwrap();
        prefs.upsert_profile(42, "https://backloggd.com/u/bob").unwrap();
        prefs.upsert_region(42, "US").unwrap();

        let all = prefs.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].owner_id, 42);
        assert_eq!(all[0].profile_url, "https://backloggd.com/u/bob");
        assert_eq!(all[0].region, "US");
        assert!(all[0].is_valid());
    }

    #[test]
    fn partial_settings_list_as_invalid_preferences() {
        let prefs = SqlitePreferences::open_in_memory().unwrap();
        prefs.upsert_profile(7, "https://backloggd.com/u/ann").unwrap();

        let all = prefs.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_valid());
    }

    #[test]
    fn remove_deletes_the_row() {
        let prefs = SqlitePreferences::open_in_memory().unwrap();
        prefs.upsert_region(7, "DE").unwrap();
        prefs.remove(7).unwrap();
        assert!(prefs.list_all().unwrap().is_empty());
    }
}
