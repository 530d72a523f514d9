pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::models::{MetadataRecord, PricingRecord, WishlistSnapshot};
use crate::util::env::env_opt;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already present for key {0}")]
    Duplicate(String),
    #[error("could not encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// How catalog records survive across reconciliation cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Records live for one cycle; `reset_all` wipes them at cycle end.
    Cycle,
    /// Records persist across cycles with no expiry.
    Persistent,
}

impl StoreMode {
    /// Read `STORE_MODE` (`cycle` | `persistent`), defaulting to cycle.
    pub fn from_env() -> Self {
        match env_opt("STORE_MODE").as_deref() {
            Some("persistent") => StoreMode::Persistent,
            Some("cycle") | None => StoreMode::Cycle,
            Some(other) => {
                warn!(value = other, "unknown STORE_MODE; defaulting to cycle");
                StoreMode::Cycle
            }
        }
    }
}

/// Persistence contract for the two catalog record kinds.
///
/// `get_*` return only the records found, in requested-key order, with no
/// placeholders for misses; a missing key is an ordinary cache miss, never
/// an error. `insert_*` is insert, not upsert: callers must only hand over
/// keys the upstream diff proved absent, and a partial failure fails the
/// whole batch.
pub trait CatalogStore: Send + Sync {
    fn get_metadata(&self, slugs: &[String]) -> Result<Vec<MetadataRecord>, StoreError>;
    fn insert_metadata(&self, records: &[MetadataRecord]) -> Result<(), StoreError>;
    fn get_pricing(&self, app_ids: &[u64], region: &str) -> Result<Vec<PricingRecord>, StoreError>;
    fn insert_pricing(&self, records: &[PricingRecord]) -> Result<(), StoreError>;
    fn insert_snapshot(&self, snapshot: &WishlistSnapshot) -> Result<(), StoreError>;
    /// Drop everything. Cycle-scoped callers invoke this at pass end; must
    /// be safe on an empty store.
    fn reset_all(&self) -> Result<(), StoreError>;
}
