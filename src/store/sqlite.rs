use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, ErrorCode};
use tracing::debug;

use crate::models::{MetadataRecord, PricingRecord, WishlistSnapshot};
use crate::store::{CatalogStore, StoreError};

/// Persistent key-value store. One row per record, JSON value, keys shaped
/// `metadata:<slug>` / `pricing:<region>:<app_id>` / `wishlist:<owner_id>`.
/// Records carry no expiry; an operator-level TTL policy is out of scope.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS catalog_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    stored_at TEXT NOT NULL
)";

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite store mutex poisoned")
    }

    fn metadata_key(slug: &str) -> String {
        format!("metadata:{slug}")
    }

    fn pricing_key(region: &str, app_id: u64) -> String {
        format!("pricing:{region}:{app_id}")
    }

    fn get_values(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM catalog_kv WHERE key = ?1")?;
        let mut values = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match stmt.query_row([key], |row| row.get::<_, String>(0)) {
                Ok(value) => values.push(value),
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(values)
    }

    /// Batch insert inside one transaction so a partial failure rolls the
    /// whole batch back. A key collision surfaces as `Duplicate`.
    fn insert_values(&self, rows: &[(String, String)]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO catalog_kv (key, value, stored_at) VALUES (?1, ?2, ?3)")?;
            let stored_at = Utc::now().to_rfc3339();
            for (key, value) in rows {
                stmt.execute((key, value, &stored_at)).map_err(|err| {
                    match err {
                        rusqlite::Error::SqliteFailure(e, _)
                            if e.code == ErrorCode::ConstraintViolation =>
                        {
                            StoreError::Duplicate(key.clone())
                        }
                        other => StoreError::Sqlite(other),
                    }
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl CatalogStore for SqliteStore {
    fn get_metadata(&self, slugs: &[String]) -> Result<Vec<MetadataRecord>, StoreError> {
        let keys: Vec<String> = slugs.iter().map(|s| Self::metadata_key(s)).collect();
        self.get_values(&keys)?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::Encode))
            .collect()
    }

    fn insert_metadata(&self, records: &[MetadataRecord]) -> Result<(), StoreError> {
        let rows = records
            .iter()
            .map(|record| {
                Ok((
                    Self::metadata_key(&record.slug),
                    serde_json::to_string(record)?,
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.insert_values(&rows)
    }

    fn get_pricing(&self, app_ids: &[u64], region: &str) -> Result<Vec<PricingRecord>, StoreError> {
        let keys: Vec<String> = app_ids
            .iter()
            .map(|id| Self::pricing_key(region, *id))
            .collect();
        self.get_values(&keys)?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::Encode))
            .collect()
    }

    fn insert_pricing(&self, records: &[PricingRecord]) -> Result<(), StoreError> {
        let rows = records
            .iter()
            .map(|record| {
                Ok((
                    Self::pricing_key(&record.region, record.app_id),
                    serde_json::to_string(record)?,
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.insert_values(&rows)
    }

    fn insert_snapshot(&self, snapshot: &WishlistSnapshot) -> Result<(), StoreError> {
        let rows = vec![(
            format!("wishlist:{}", snapshot.owner_id),
            serde_json::to_string(snapshot)?,
        )];
        self.insert_values(&rows)
    }

    fn reset_all(&self) -> Result<(), StoreError> {
        let wiped = self.lock().execute("DELETE FROM catalog_kv", [])?;
        debug!(rows = wiped, "catalog store reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalGame, ExternalSource};

    fn metadata(slug: &str) -> MetadataRecord {
        MetadataRecord {
            slug: slug.into(),
            name: slug.to_uppercase(),
            external_games: vec![ExternalGame {
                uid: "400".into(),
                external_game_source: ExternalSource {
                    name: "Steam".into(),
                },
            }],
        }
    }

    fn pricing(app_id: u64, region: &str, discount: u32) -> PricingRecord {
        PricingRecord {
            app_id,
            region: region.into(),
            name: format!("app-{app_id}"),
            discount_percent: discount,
            initial_formatted: "$20".into(),
            final_formatted: "$10".into(),
        }
    }

    #[test]
    fn metadata_round_trips_through_json_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_metadata(&[metadata("portal")]).unwrap();
        let got = store.get_metadata(&["portal".into()]).unwrap();
        assert_eq!(got, vec![metadata("portal")]);
    }

    #[test]
    fn missing_keys_are_not_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_metadata(&["absent".into()]).unwrap().is_empty());
        assert!(store.get_pricing(&[999], "US").unwrap().is_empty());
    }

    #[test]
    fn pricing_keys_are_region_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_pricing(&[pricing(400, "US", 50), pricing(400, "DE", 30)])
            .unwrap();
        let us = store.get_pricing(&[400], "US").unwrap();
        assert_eq!(us.len(), 1);
        assert_eq!(us[0].discount_percent, 50);
    }

    #[test]
    fn duplicate_insert_fails_and_rolls_back_the_batch() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_pricing(&[pricing(400, "US", 50)]).unwrap();
        let err = store
            .insert_pricing(&[pricing(500, "US", 10), pricing(400, "US", 50)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert!(store.get_pricing(&[500], "US").unwrap().is_empty());
    }

    #[test]
    fn reset_all_wipes_every_record_kind() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_metadata(&[metadata("portal")]).unwrap();
        store
            .insert_snapshot(&WishlistSnapshot {
                owner_id: 42,
                slugs: vec!["portal".into()],
            })
            .unwrap();
        store.reset_all().unwrap();
        assert!(store.get_metadata(&["portal".into()]).unwrap().is_empty());
    }
}
