pub mod igdb;
pub mod steam;

pub use igdb::IgdbClient;
pub use steam::SteamClient;

use crate::models::{MetadataRecord, PricingRecord};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} failed with status {status}")]
    Status { status: u16, context: String },
    #[error("could not decode response body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("pricing api reported failure for app {app_id}")]
    ExternalApi { app_id: u64 },
}

/// Batched metadata retrieval: one request per reconciliation pass carrying
/// every missing slug. Zero matches is a valid outcome, not an error.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_games(&self, slugs: &[String]) -> Result<Vec<MetadataRecord>, FetchError>;
}

/// Per-id pricing retrieval: one request per app id, strictly sequential,
/// with fixed spacing between requests.
#[async_trait]
pub trait PricingFetcher: Send + Sync {
    async fn fetch_app_details(
        &self,
        app_ids: &[u64],
        region: &str,
    ) -> Result<Vec<PricingRecord>, FetchError>;
}
