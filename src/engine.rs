use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::models::{MetadataRecord, PricingRecord, SaleEntry, UserPreference, WishlistSnapshot};
use crate::notify::SaleNotifier;
use crate::prefs::PreferenceSource;
use crate::providers::{MetadataFetcher, PricingFetcher};
use crate::scrape::WishlistSource;
use crate::store::{CatalogStore, StoreMode};
use crate::types::keyset::KeySet;

const STEAM_SOURCE_NAME: &str = "Steam";
const STORE_PAGE_BASE: &str = "https://store.steampowered.com/app";

/// Outcome counters for one reconciliation cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleSummary {
    pub users_total: usize,
    pub users_skipped: usize,
    pub users_failed: usize,
    pub sales_emitted: usize,
}

/// Drives the per-user pipeline: scrape, two get→diff→fetch→merge cycles
/// against the store (metadata, then pricing), then sale detection. All
/// collaborators are injected handles; the engine owns ordering and failure
/// decisions, nothing else.
pub struct ReconciliationEngine {
    wishlist: Arc<dyn WishlistSource>,
    metadata: Arc<dyn MetadataFetcher>,
    pricing: Arc<dyn PricingFetcher>,
    store: Arc<dyn CatalogStore>,
    mode: StoreMode,
}

impl ReconciliationEngine {
    pub fn new(
        wishlist: Arc<dyn WishlistSource>,
        metadata: Arc<dyn MetadataFetcher>,
        pricing: Arc<dyn PricingFetcher>,
        store: Arc<dyn CatalogStore>,
        mode: StoreMode,
    ) -> Self {
        Self {
            wishlist,
            metadata,
            pricing,
            store,
            mode,
        }
    }

    /// One pass over every user. A single user's failure never aborts the
    /// cycle for the others; failed users wait for the next scheduled run.
    pub async fn run_cycle(
        &self,
        prefs: &dyn PreferenceSource,
        notifier: &dyn SaleNotifier,
    ) -> Result<CycleSummary> {
        let all = prefs.list_all().context("could not list user preferences")?;
        let mut summary = CycleSummary {
            users_total: all.len(),
            ..Default::default()
        };

        for pref in &all {
            if !pref.is_valid() {
                debug!(owner_id = pref.owner_id, "skipping incomplete preference");
                summary.users_skipped += 1;
                continue;
            }
            match self.process_user(pref).await {
                Ok(sales) => {
                    summary.sales_emitted += sales.len();
                    if !sales.is_empty() {
                        if let Err(err) = notifier.notify(pref.owner_id, &sales) {
                            warn!(owner_id = pref.owner_id, error = %err, "sale notification failed");
                        }
                    }
                }
                Err(err) => {
                    summary.users_failed += 1;
                    warn!(owner_id = pref.owner_id, error = ?err, "reconciliation failed for user");
                }
            }
        }

        if self.mode == StoreMode::Cycle {
            self.store
                .reset_all()
                .context("could not reset cycle-scoped store")?;
        }

        info!(
            users = summary.users_total,
            skipped = summary.users_skipped,
            failed = summary.users_failed,
            sales = summary.sales_emitted,
            "reconciliation cycle complete"
        );
        Ok(summary)
    }

    /// Full pipeline for one user. Empty wishlists and wishlists with no
    /// storefront cross-references terminate early with an empty sale list.
    pub async fn process_user(&self, pref: &UserPreference) -> Result<Vec<SaleEntry>> {
        let slugs = self
            .wishlist
            .scrape(&pref.profile_url)
            .await
            .with_context(|| format!("could not scrape wishlist for {}", pref.profile_url))?;
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        if self.mode == StoreMode::Cycle {
            let snapshot = WishlistSnapshot {
                owner_id: pref.owner_id,
                slugs: slugs.clone(),
            };
            self.store
                .insert_snapshot(&snapshot)
                .context("could not record wishlist snapshot")?;
        }

        let games = self.obtain_metadata(&slugs).await?;
        let app_ids = extract_steam_app_ids(&games)?;
        if app_ids.is_empty() {
            return Ok(Vec::new());
        }

        let pricing = self.obtain_pricing(&app_ids, &pref.region).await?;
        Ok(detect_sales(&pricing))
    }

    /// get → diff → fetch missing → insert → reread. The fetch and insert
    /// are skipped entirely when nothing is missing.
    async fn obtain_metadata(&self, slugs: &[String]) -> Result<Vec<MetadataRecord>> {
        let existing = self
            .store
            .get_metadata(slugs)
            .context("could not read cached metadata")?;
        let missing = missing_slugs(slugs, &existing);
        if !missing.is_empty() {
            debug!(missing = missing.len(), "fetching metadata for cache misses");
            let fetched = self
                .metadata
                .fetch_games(&missing)
                .await
                .context("could not fetch catalog metadata")?;
            if !fetched.is_empty() {
                self.store
                    .insert_metadata(&fetched)
                    .context("could not insert fetched metadata")?;
            }
        }
        self.store
            .get_metadata(slugs)
            .context("could not reread metadata")
    }

    async fn obtain_pricing(&self, app_ids: &[u64], region: &str) -> Result<Vec<PricingRecord>> {
        let existing = self
            .store
            .get_pricing(app_ids, region)
            .context("could not read cached pricing")?;
        let missing = missing_app_ids(app_ids, &existing)?;
        if !missing.is_empty() {
            debug!(missing = missing.len(), region, "fetching pricing for cache misses");
            let fetched = self
                .pricing
                .fetch_app_details(&missing, region)
                .await
                .context("could not fetch storefront pricing")?;
            if !fetched.is_empty() {
                self.store
                    .insert_pricing(&fetched)
                    .context("could not insert fetched pricing")?;
            }
        }
        self.store
            .get_pricing(app_ids, region)
            .context("could not reread pricing")
    }
}

/// Wishlist slugs with no cached metadata record.
fn missing_slugs(wanted: &[String], have: &[MetadataRecord]) -> Vec<String> {
    KeySet::difference(
        wanted.iter().cloned(),
        have.iter().map(|record| record.slug.as_str()),
    )
    .into_values()
}

/// App ids with no cached pricing record. Ids diff as strings and parse
/// back; a non-numeric key here is a programming error upstream.
fn missing_app_ids(wanted: &[u64], have: &[PricingRecord]) -> Result<Vec<u64>> {
    KeySet::difference(
        wanted.iter().map(|id| id.to_string()),
        have.iter().map(|record| record.app_id.to_string()),
    )
    .into_values()
    .into_iter()
    .map(|id| {
        id.parse::<u64>()
            .with_context(|| format!("could not parse app id {id}"))
    })
    .collect()
}

/// Walk every metadata record's cross-references, keeping storefront ids.
/// A non-numeric uid fails the user's pass.
fn extract_steam_app_ids(games: &[MetadataRecord]) -> Result<Vec<u64>> {
    let mut app_ids = Vec::new();
    for game in games {
        for external in &game.external_games {
            if external.external_game_source.name == STEAM_SOURCE_NAME {
                let app_id = external.uid.parse::<u64>().with_context(|| {
                    format!("could not parse storefront uid {:?} for {}", external.uid, game.slug)
                })?;
                if !app_ids.contains(&app_id) {
                    app_ids.push(app_id);
                }
            }
        }
    }
    Ok(app_ids)
}

/// Keep discounted records only and shape them for delivery.
fn detect_sales(pricing: &[PricingRecord]) -> Vec<SaleEntry> {
    pricing
        .iter()
        .filter(|record| record.discount_percent > 0)
        .map(|record| SaleEntry {
            name: record.name.clone(),
            store_url: format!("{STORE_PAGE_BASE}/{}/", record.app_id),
            discount_percent: record.discount_percent,
            initial_formatted: record.initial_formatted.clone(),
            final_formatted: record.final_formatted.clone(),
        })
        .collect()
}
