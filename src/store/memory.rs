use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::models::{MetadataRecord, PricingRecord, WishlistSnapshot};
use crate::store::{CatalogStore, StoreError};

/// Cycle-scoped store: plain maps wiped by `reset_all` at pass boundaries.
/// Lookups still hit records inserted earlier in the same pass, so items
/// shared across users in one run are fetched once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    metadata: HashMap<String, MetadataRecord>,
    pricing: HashMap<(String, u64), PricingRecord>,
    snapshots: Vec<WishlistSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }
}

impl CatalogStore for MemoryStore {
    fn get_metadata(&self, slugs: &[String]) -> Result<Vec<MetadataRecord>, StoreError> {
        let inner = self.lock();
        let mut seen: HashSet<&str> = HashSet::new();
        Ok(slugs
            .iter()
            .filter(|slug| seen.insert(slug.as_str()))
            .filter_map(|slug| inner.metadata.get(slug).cloned())
            .collect())
    }

    fn insert_metadata(&self, records: &[MetadataRecord]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for record in records {
            if inner.metadata.contains_key(&record.slug) {
                return Err(StoreError::Duplicate(record.slug.clone()));
            }
        }
        for record in records {
            inner.metadata.insert(record.slug.clone(), record.clone());
        }
        Ok(())
    }

    fn get_pricing(&self, app_ids: &[u64], region: &str) -> Result<Vec<PricingRecord>, StoreError> {
        let inner = self.lock();
        let mut seen: HashSet<u64> = HashSet::new();
        Ok(app_ids
            .iter()
            .filter(|app_id| seen.insert(**app_id))
            .filter_map(|app_id| inner.pricing.get(&(region.to_string(), *app_id)).cloned())
            .collect())
    }

    fn insert_pricing(&self, records: &[PricingRecord]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for record in records {
            let key = (record.region.clone(), record.app_id);
            if inner.pricing.contains_key(&key) {
                return Err(StoreError::Duplicate(format!(
                    "{}:{}",
                    record.region, record.app_id
                )));
            }
        }
        for record in records {
            inner
                .pricing
                .insert((record.region.clone(), record.app_id), record.clone());
        }
        Ok(())
    }

    fn insert_snapshot(&self, snapshot: &WishlistSnapshot) -> Result<(), StoreError> {
        self.lock().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn reset_all(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.metadata.clear();
        inner.pricing.clear();
        inner.snapshots.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(slug: &str) -> MetadataRecord {
        MetadataRecord {
            slug: slug.into(),
            name: slug.to_uppercase(),
            external_games: Vec::new(),
        }
    }

    fn pricing(app_id: u64, region: &str) -> PricingRecord {
        PricingRecord {
            app_id,
            region: region.into(),
            name: format!("app-{app_id}"),
            discount_percent: 0,
            initial_formatted: String::new(),
            final_formatted: String::new(),
        }
    }

    #[test]
    fn get_returns_only_found_records_in_request_order() {
        let store = MemoryStore::new();
        store
            .insert_metadata(&[metadata("portal"), metadata("halo")])
            .unwrap();
        let got = store
            .get_metadata(&["halo".into(), "missing".into(), "portal".into()])
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].slug, "halo");
        assert_eq!(got[1].slug, "portal");
    }

    #[test]
    fn insert_rejects_duplicates_without_partial_writes() {
        let store = MemoryStore::new();
        store.insert_metadata(&[metadata("portal")]).unwrap();
        let err = store
            .insert_metadata(&[metadata("halo"), metadata("portal")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        // The batch failed whole: "halo" must not have landed.
        assert!(store.get_metadata(&["halo".into()]).unwrap().is_empty());
    }

    #[test]
    fn pricing_is_keyed_per_region() {
        let store = MemoryStore::new();
        store
            .insert_pricing(&[pricing(400, "US"), pricing(400, "DE")])
            .unwrap();
        assert_eq!(store.get_pricing(&[400], "US").unwrap().len(), 1);
        assert_eq!(store.get_pricing(&[400], "FR").unwrap().len(), 0);
    }

    #[test]
    fn duplicate_requested_keys_yield_one_record() {
        let store = MemoryStore::new();
        store.insert_pricing(&[pricing(400, "US")]).unwrap();
        assert_eq!(store.get_pricing(&[400, 400], "US").unwrap().len(), 1);
    }

    #[test]
    fn reset_all_is_safe_when_empty_and_clears_everything() {
        let store = MemoryStore::new();
        store.reset_all().unwrap();
        store.insert_metadata(&[metadata("portal")]).unwrap();
        store.reset_all().unwrap();
        assert!(store.get_metadata(&["portal".into()]).unwrap().is_empty());
    }
}
